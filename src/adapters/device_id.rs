//! Device identity from the ESP32 factory MAC address.
//!
//! Implements [`UniqueIdPort`] over the 6-byte eFuse MAC.  The bytes are
//! deterministic across reboots, so the self-provisioned unicast address
//! is too.  Also derives the short hostname used in log banners.

use crate::app::ports::UniqueIdPort;
use crate::error::HwError;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> Result<MacAddress, HwError> {
    let mut mac: MacAddress = [0u8; 6];
    let ret = unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        return Err(HwError::UniqueIdUnavailable);
    }
    Ok(mac)
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> Result<MacAddress, HwError> {
    Ok([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

/// Derive the hostname from the last 3 MAC bytes.
/// Format: `meshswitch-xxyyzz`.
pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    use core::fmt::Write;
    let _ = write!(name, "meshswitch-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}

/// [`UniqueIdPort`] backed by the eFuse MAC.
///
/// `with_override` lets the simulator pretend to be a different board
/// (or, with `None`, a board without a readable id).
pub struct MacUniqueId {
    #[cfg(not(target_os = "espidf"))]
    sim: Option<MacAddress>,
}

impl MacUniqueId {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim: read_mac().ok(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn with_override(mac: Option<MacAddress>) -> Self {
        Self { sim: mac }
    }

    #[cfg(target_os = "espidf")]
    fn mac(&self) -> Result<MacAddress, HwError> {
        read_mac()
    }

    #[cfg(not(target_os = "espidf"))]
    fn mac(&self) -> Result<MacAddress, HwError> {
        self.sim.ok_or(HwError::UniqueIdUnavailable)
    }
}

impl Default for MacUniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueIdPort for MacUniqueId {
    fn read_unique_id(&mut self, buf: &mut [u8]) -> Result<usize, HwError> {
        let mac = self.mac()?;
        // Least-significant (most varying) bytes first.
        let n = buf.len().min(mac.len());
        for (dst, src) in buf.iter_mut().zip(mac.iter().rev()) {
            *dst = *src;
        }
        Ok(n)
    }
}
