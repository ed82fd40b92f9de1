//! Known apps and device toggles the router can recognise by name.

use airi_core::config::RouterConfig;

/// Built-in app name to Android package mappings.
pub const DEFAULT_APP_PACKAGES: &[(&str, &str)] = &[
    ("whatsapp", "com.whatsapp"),
    ("instagram", "com.instagram.android"),
    ("youtube", "com.google.android.youtube"),
    ("maps", "com.google.android.apps.maps"),
    ("google maps", "com.google.android.apps.maps"),
    ("spotify", "com.spotify.music"),
    ("netflix", "com.netflix.mediaclient"),
    ("telegram", "org.telegram.messenger"),
    ("twitter", "com.twitter.android"),
    ("x", "com.twitter.android"),
    ("facebook", "com.facebook.katana"),
    ("snapchat", "com.snapchat.android"),
    ("gmail", "com.google.android.gm"),
    ("camera", "android.media.action.IMAGE_CAPTURE"),
    ("calculator", "com.android.calculator2"),
    ("settings", "com.android.settings"),
    ("chrome", "com.android.chrome"),
    ("clock", "com.android.deskclock"),
    ("contacts", "com.android.contacts"),
    ("phone", "com.android.dialer"),
    ("photos", "com.google.android.apps.photos"),
    ("play store", "com.android.vending"),
    ("files", "com.google.android.documentsui"),
    ("tiktok", "com.zhiliaoapp.musically"),
    ("linkedin", "com.linkedin.android"),
    ("zoom", "us.zoom.videomeetings"),
    ("uber", "com.ubercab"),
];

/// Built-in toggleable device settings, checked in this order.
pub const DEFAULT_TOGGLE_SETTINGS: &[&str] = &[
    "wifi",
    "wi-fi",
    "bluetooth",
    "flashlight",
    "torch",
    "airplane mode",
    "do not disturb",
    "hotspot",
    "dark mode",
    "rotation",
    "silent",
    "vibration",
];

/// Lookup tables used by the entity extractors.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Sorted longest name first so "google maps" wins over "maps".
    apps: Vec<(String, String)>,
    toggles: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl Catalog {
    /// Build the catalog from the built-in tables plus configured additions.
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut apps: Vec<(String, String)> = DEFAULT_APP_PACKAGES
            .iter()
            .map(|(name, package)| (name.to_string(), package.to_string()))
            .collect();

        for (name, package) in &config.app_packages {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            match apps.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = package.clone(),
                None => apps.push((name, package.clone())),
            }
        }
        apps.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let mut toggles: Vec<String> = DEFAULT_TOGGLE_SETTINGS
            .iter()
            .map(|t| t.to_string())
            .collect();
        for toggle in &config.toggle_settings {
            let toggle = toggle.trim().to_lowercase();
            if !toggle.is_empty() && !toggles.contains(&toggle) {
                toggles.push(toggle);
            }
        }

        Self { apps, toggles }
    }

    /// The longest known app name contained in `lower`, with its package.
    pub fn find_app(&self, lower: &str) -> Option<(&str, &str)> {
        self.apps
            .iter()
            .find(|(name, _)| lower.contains(name.as_str()))
            .map(|(name, package)| (name.as_str(), package.as_str()))
    }

    /// Exact package lookup by app name.
    pub fn package_for(&self, name: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(app, _)| app == name)
            .map(|(_, package)| package.as_str())
    }

    /// The first known toggle keyword contained in `lower`.
    pub fn find_toggle(&self, lower: &str) -> Option<&str> {
        self.toggles
            .iter()
            .find(|t| lower.contains(t.as_str()))
            .map(String::as_str)
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }
}
