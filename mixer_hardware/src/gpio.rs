//! Raspberry Pi GPIO backends (rppal).
//!
//! Switches use internal pull-ups, so a pressed switch reads low. Pump
//! relays are active-low: driving the line low energizes the pump.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mixer_traits::{HwResult, InputLine, InputPins, Pumps};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::{debug, info};

use crate::error::{HwError, Result};

/// BCM pin assignment for the operator panel.
#[derive(Debug, Clone, Copy)]
pub struct PanelPins {
    pub auto_switch: u8,
    pub manual_switch: u8,
    pub confirm_switch: u8,
    pub cancel_switch: u8,
    pub encoder_clk: u8,
    pub encoder_dt: u8,
}

impl PanelPins {
    fn pin_for(&self, line: InputLine) -> u8 {
        match line {
            InputLine::AutoSwitch => self.auto_switch,
            InputLine::ManualSwitch => self.manual_switch,
            InputLine::ConfirmSwitch => self.confirm_switch,
            InputLine::CancelSwitch => self.cancel_switch,
            InputLine::EncoderClk => self.encoder_clk,
            InputLine::EncoderDt => self.encoder_dt,
        }
    }
}

/// Panel inputs. Lines sharing a BCM pin share one `InputPin`; clones share
/// the pins so the cancel watcher thread can poll alongside the main loop.
#[derive(Clone)]
pub struct GpioPanel {
    pins: PanelPins,
    inputs: Arc<Mutex<HashMap<u8, InputPin>>>,
}

impl GpioPanel {
    pub fn new(pins: PanelPins) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let mut inputs = HashMap::new();
        for line in InputLine::ALL {
            let bcm = pins.pin_for(line);
            if inputs.contains_key(&bcm) {
                continue;
            }
            let pin = gpio
                .get(bcm)
                .map_err(|e| HwError::Gpio(format!("open input pin {bcm}: {e}")))?
                .into_input_pullup();
            inputs.insert(bcm, pin);
        }
        info!(?pins, "panel inputs ready");
        Ok(Self {
            pins,
            inputs: Arc::new(Mutex::new(inputs)),
        })
    }
}

impl InputPins for GpioPanel {
    fn is_high(&mut self, line: InputLine) -> HwResult<bool> {
        let bcm = self.pins.pin_for(line);
        let inputs = self.inputs.lock().map_err(|_| HwError::Poisoned)?;
        let pin = inputs
            .get(&bcm)
            .ok_or_else(|| HwError::Gpio(format!("input pin {bcm} not configured")))?;
        Ok(pin.is_high())
    }
}

/// Four relay-driven pumps on active-low outputs.
pub struct GpioPumps {
    outputs: Vec<OutputPin>,
}

impl GpioPumps {
    pub fn new(pins: [u8; 4]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let mut outputs = Vec::with_capacity(pins.len());
        for bcm in pins {
            let mut pin = gpio
                .get(bcm)
                .map_err(|e| HwError::Gpio(format!("open pump pin {bcm}: {e}")))?
                .into_output_high();
            // Keep the relay released if the process exits without cleanup.
            pin.set_reset_on_drop(false);
            pin.set_high();
            outputs.push(pin);
        }
        info!(?pins, "pump outputs ready (active-low)");
        Ok(Self { outputs })
    }

    fn pin(&mut self, slot: u8) -> Result<&mut OutputPin> {
        self.outputs
            .get_mut(usize::from(slot))
            .ok_or(HwError::InvalidSlot(slot))
    }
}

impl Pumps for GpioPumps {
    fn start(&mut self, slot: u8) -> HwResult<()> {
        self.pin(slot)?.set_low();
        debug!(slot, "pump on");
        Ok(())
    }

    fn stop(&mut self, slot: u8) -> HwResult<()> {
        self.pin(slot)?.set_high();
        debug!(slot, "pump off");
        Ok(())
    }
}

impl Drop for GpioPumps {
    fn drop(&mut self) {
        for pin in &mut self.outputs {
            pin.set_high();
        }
    }
}
