//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use pwm_pca9685::{Channel, Pca9685};

use super::{ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of counts in one PWM period.
const MAX_PWM: u16 = 4096;

/// Prescale value giving a 50 Hz PWM frequency from the internal 25 MHz oscillator.
pub const PRESCALE_50_HZ: u8 = 121;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Get the board channel with the given index, or `None` if there's no such channel.
pub fn channel(index: u8) -> Option<Channel> {
    let channel = match index {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return None,
    };

    Some(channel)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> ServoDriver for Pca9685<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    type Channel = Channel;

    fn set_duty_cycle(
        &mut self,
        channel: Self::Channel,
        duty_cycle: f64,
    ) -> Result<(), ServoError> {
        // If the duty cycle is out of range return an error
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ServoError::InvalidDutyCycle);
        }

        // The off count must stay inside the period
        let off = ((duty_cycle * MAX_PWM as f64) as u16).min(MAX_PWM - 1);

        self.set_channel_on(channel, 0)
            .and_then(|_| self.set_channel_off(channel, off))
            .map_err(|e| match e {
                pwm_pca9685::Error::I2C(_) => ServoError::I2c,
                pwm_pca9685::Error::InvalidInputData => ServoError::InvalidDutyCycle,
            })
    }
}
