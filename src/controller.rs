//! Controller collaborator contract.
//!
//! The panel never talks to hardware itself. Everything it knows about the
//! laser comes through a [`LaserController`], injected at construction. The
//! wire protocol behind it is the implementor's business.
//!
//! All methods take `&self`; implementations that keep mutable device state
//! use interior mutability, as the drivers in this workspace do.

use anyhow::Result;
use async_trait::async_trait;

use crate::controls::Shutter;

/// Device I/O for a Spectra-Physics laser.
///
/// Queries return raw device values. Shutter states are `0` (closed) or `1`
/// (open); any other value is passed through untouched so the caller can
/// treat it as a fault.
#[async_trait]
pub trait LaserController: Send + Sync {
    /// Lifecycle status code, nominally `0..=127`.
    async fn get_status(&self) -> Result<i32>;

    /// Raw pump shutter state.
    async fn pump_shutter_state(&self) -> Result<i32>;

    /// Raw IR shutter state.
    async fn ir_shutter_state(&self) -> Result<i32>;

    /// Output power in watts.
    async fn get_power(&self) -> Result<f64>;

    /// Wavelength in nm.
    async fn get_wavelength(&self) -> Result<i32>;

    /// Motor position of the tuning stage.
    async fn get_motor_position(&self) -> Result<f64>;

    /// Device-reported mode string.
    async fn get_mode(&self) -> Result<String>;

    /// Head temperature.
    async fn get_temperature(&self) -> Result<f64>;

    /// Relative humidity.
    async fn get_humidity(&self) -> Result<f64>;

    /// Diode current.
    async fn get_current(&self) -> Result<f64>;

    /// Recent status-code history, most recent first.
    async fn get_history(&self) -> Result<String>;

    /// Switch into alignment mode.
    async fn set_mode_align(&self) -> Result<()>;

    /// Switch into running mode.
    async fn set_mode_run(&self) -> Result<()>;

    /// Open the pump beam shutter.
    async fn open_pump_shutter(&self) -> Result<()>;

    /// Close the pump beam shutter.
    async fn close_pump_shutter(&self) -> Result<()>;

    /// Open the IR beam shutter.
    async fn open_ir_shutter(&self) -> Result<()>;

    /// Close the IR beam shutter.
    async fn close_ir_shutter(&self) -> Result<()>;

    /// Start the power-on sequence.
    ///
    /// With `blocking = false` the call returns as soon as the command is
    /// accepted; progress is observed through [`get_status`](Self::get_status).
    async fn power_on(&self, blocking: bool) -> Result<()>;

    /// Turn emission off.
    async fn power_off(&self) -> Result<()>;

    /// Tune to `wavelength_nm`. Range checks are up to the implementation.
    async fn set_wavelength(&self, wavelength_nm: f64) -> Result<()>;

    /// Move the tuning motor.
    async fn set_motor_position(&self, position: f64) -> Result<()>;
}

/// Shutter-addressed helpers over the per-shutter controller methods.
#[async_trait]
pub trait ShutterCommands {
    /// Raw state of `shutter`.
    async fn shutter_state(&self, shutter: Shutter) -> Result<i32>;
    /// Open `shutter`.
    async fn open_shutter(&self, shutter: Shutter) -> Result<()>;
    /// Close `shutter`.
    async fn close_shutter(&self, shutter: Shutter) -> Result<()>;
}

#[async_trait]
impl<C: LaserController + ?Sized> ShutterCommands for C {
    async fn shutter_state(&self, shutter: Shutter) -> Result<i32> {
        match shutter {
            Shutter::Pump => self.pump_shutter_state().await,
            Shutter::Ir => self.ir_shutter_state().await,
        }
    }

    async fn open_shutter(&self, shutter: Shutter) -> Result<()> {
        match shutter {
            Shutter::Pump => self.open_pump_shutter().await,
            Shutter::Ir => self.open_ir_shutter().await,
        }
    }

    async fn close_shutter(&self, shutter: Shutter) -> Result<()> {
        match shutter {
            Shutter::Pump => self.close_pump_shutter().await,
            Shutter::Ir => self.close_ir_shutter().await,
        }
    }
}
