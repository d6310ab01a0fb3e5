use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: WriteProtection + NorFlash {}

impl<T: WriteProtection + NorFlash> Platform for T {}

/// Serial NOR flashes keep a write enable latch that has to be set before every program or erase
/// command and is cleared by the device once the command finished. The storage layer calls
/// `set_write_protection(false)` right before each write and erase.
pub trait WriteProtection {
    fn set_write_protection(&mut self, enabled: bool);
}

impl<T: WriteProtection> WriteProtection for &mut T {
    fn set_write_protection(&mut self, enabled: bool) {
        (**self).set_write_protection(enabled)
    }
}

pub trait AlignedOps: Platform {
    fn align_read_ceil(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_read_floor(size: usize) -> usize {
        align_floor(size, Self::READ_SIZE)
    }

    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_hal::peripherals::FLASH;
    use esp_storage::FlashStorage;

    use crate::platform::WriteProtection;

    /// esp-storage sets the write enable latch itself as part of every program and erase call.
    impl WriteProtection for FlashStorage<'_> {
        fn set_write_protection(&mut self, _enabled: bool) {}
    }

    /// Creates the flash driver for the SPI flash the chip boots from.
    pub fn boot_flash(flash: FLASH<'_>) -> FlashStorage<'_> {
        FlashStorage::new(flash)
    }
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
pub use chip::*;
