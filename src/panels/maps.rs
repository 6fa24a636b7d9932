use std::sync::Arc;

use crate::platform::{Coordinates, PlatformFamily, UrlOpener};

/// External maps destination for `coords`.
///
/// iOS goes to Apple Maps; every other platform falls back to the Google
/// Maps web URL, which any browser can handle.
pub fn maps_url(platform: PlatformFamily, coords: Coordinates) -> String {
    let Coordinates {
        latitude,
        longitude,
    } = coords;
    match platform {
        PlatformFamily::Ios => format!("http://maps.apple.com/?ll={latitude},{longitude}"),
        PlatformFamily::Android | PlatformFamily::Web => {
            format!("https://www.google.com/maps?q={latitude},{longitude}")
        }
    }
}

/// Opens coordinates in the platform's maps handler.
#[derive(Clone)]
pub struct MapLauncher {
    opener: Arc<dyn UrlOpener>,
    platform: PlatformFamily,
}

impl MapLauncher {
    pub fn new(opener: Arc<dyn UrlOpener>, platform: PlatformFamily) -> Self {
        Self { opener, platform }
    }

    pub fn open(&self, coords: Coordinates) -> anyhow::Result<String> {
        let url = maps_url(self.platform, coords);
        self.opener.open_url(&url)?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERE: Coordinates = Coordinates {
        latitude: 51.5,
        longitude: -0.125,
    };

    #[test]
    fn ios_uses_apple_maps() {
        assert_eq!(
            maps_url(PlatformFamily::Ios, HERE),
            "http://maps.apple.com/?ll=51.5,-0.125"
        );
    }

    #[test]
    fn everything_else_falls_back_to_google() {
        for platform in [PlatformFamily::Android, PlatformFamily::Web] {
            assert_eq!(
                maps_url(platform, HERE),
                "https://www.google.com/maps?q=51.5,-0.125"
            );
        }
    }
}
