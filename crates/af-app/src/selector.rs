use af_core::traits::{DeviceEnumerator, DeviceInfo};

/// Surface de sélection des caméras.
///
/// Repeuplée après chaque résolution de métadonnées. Sélectionne le
/// périphérique actif s'il est listé, sinon la première entrée.
///
/// # Example
/// ```
/// use af_app::selector::DeviceSelector;
/// use af_core::traits::DeviceInfo;
///
/// let mut selector = DeviceSelector::default();
/// selector.populate(
///     vec![
///         DeviceInfo { id: "a".into(), label: "A".into() },
///         DeviceInfo { id: "b".into(), label: "B".into() },
///     ],
///     Some("b"),
/// );
/// assert!(selector.is_enabled());
/// assert_eq!(selector.selected().map(|d| d.id.as_str()), Some("b"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct DeviceSelector {
    devices: Vec<DeviceInfo>,
    selected: Option<usize>,
}

impl DeviceSelector {
    /// Remplace la liste et recale la sélection sur `active`.
    pub fn populate(&mut self, devices: Vec<DeviceInfo>, active: Option<&str>) {
        self.selected = active
            .and_then(|id| devices.iter().position(|d| d.id == id))
            .or(if devices.is_empty() { None } else { Some(0) });
        self.devices = devices;
    }

    /// Interroge `enumerator`. Une erreur d'énumération vide la liste.
    pub fn refresh(&mut self, enumerator: &dyn DeviceEnumerator, active: Option<&str>) {
        let devices = enumerator.list_video_inputs().unwrap_or_else(|e| {
            log::warn!("Énumération des caméras impossible : {e}");
            Vec::new()
        });
        self.populate(devices, active);
    }

    /// La sélection n'a de sens qu'à partir de deux entrées.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.devices.len() >= 2
    }

    /// Entrées listées.
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Index surligné.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Entrée surlignée.
    #[must_use]
    pub fn selected(&self) -> Option<&DeviceInfo> {
        self.devices.get(self.selected?)
    }

    /// Message à afficher à la place de la liste, le cas échéant.
    #[must_use]
    pub fn placeholder(&self) -> Option<&'static str> {
        self.devices.is_empty().then_some("Aucune caméra trouvée")
    }

    /// Remonte d'une entrée (bouclage en haut).
    pub fn select_previous(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let n = self.devices.len();
        self.selected = Some(self.selected.map_or(0, |i| (i + n - 1) % n));
    }

    /// Descend d'une entrée (bouclage en bas).
    pub fn select_next(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let n = self.devices.len();
        self.selected = Some(self.selected.map_or(0, |i| (i + 1) % n));
    }
}
