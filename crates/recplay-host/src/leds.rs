use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use tracing::info;

/// An indicator LED that only exists in the log.
#[derive(Debug)]
pub struct LogLed {
    name: &'static str,
    lit: bool,
    toggles: u32,
}

impl LogLed {
    pub fn new(name: &'static str) -> Self {
        Self { name, lit: false, toggles: 0 }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Number of times the LED changed state.
    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    fn set(&mut self, lit: bool) {
        if lit != self.lit {
            self.toggles += 1;
        }
        self.lit = lit;
        info!("{} LED {}", self.name, if lit { "on" } else { "off" });
    }
}

impl ErrorType for LogLed {
    type Error = Infallible;
}

impl OutputPin for LogLed {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Instant;
    use recplay_core::{ButtonLevels, Controller, IndicatorLeds, ModeFlags, ModeId, RecPlayConfig};

    #[test]
    fn leds_follow_the_controller() {
        let flags = ModeFlags::new();
        let config = RecPlayConfig::default();
        let mut ctl = Controller::new(&config, &flags);
        let mut leds = IndicatorLeds::new(LogLed::new("Record"), LogLed::new("Play"));

        let held = ButtonLevels { record: false, play: true };
        for t in 0..=40 {
            ctl.poll(held, Instant::from_millis(t));
            ctl.show(&mut leds);
        }
        assert!(leds.is_lit(ModeId::Recording));
        assert!(!leds.is_lit(ModeId::Playing));

        let idle = ButtonLevels { record: true, play: true };
        ctl.poll(idle, Instant::from_millis(10_100));
        ctl.show(&mut leds);
        assert!(!leds.is_lit(ModeId::Recording));

        let (record, play) = leds.release();
        assert_eq!(record.toggles(), 2);
        assert!(!play.is_lit());
    }
}
