//! Combination dial arithmetic.
//!
//! Each dial shows one digit and is turned one step at a time. Turning past
//! the last digit wraps back to zero and vice versa.
//!
//! ```
//! use heist_logic::combination::{spin, is_solved};
//!
//! assert_eq!(spin(9, true, 10), 0);
//! assert_eq!(spin(0, false, 10), 9);
//! assert!(is_solved(&[1, 2, 3, 4], &[1, 2, 3, 4]));
//! ```

/// Number of positions on a standard dial.
pub const DIAL_SIZE: u8 = 10;

/// Turn a dial one step up or down with wrap-around.
pub fn spin(digit: u8, up: bool, dial_size: u8) -> u8 {
    let size = dial_size.max(1);
    let digit = digit % size;
    if up {
        (digit + 1) % size
    } else if digit == 0 {
        size - 1
    } else {
        digit - 1
    }
}

/// Whether the dials match the code exactly.
pub fn is_solved(digits: &[u8], code: &[u8]) -> bool {
    !code.is_empty() && digits == code
}

/// Number of single-step turns needed to move from `from` to `to`,
/// taking the shorter direction. Returns `(steps, up)`.
pub fn shortest_turn(from: u8, to: u8, dial_size: u8) -> (u8, bool) {
    let size = u16::from(dial_size.max(1));
    let from = u16::from(from) % size;
    let to = u16::from(to) % size;
    let up_steps = (to + size - from) % size;
    let down_steps = (from + size - to) % size;
    // Both are below `size`, which came from a u8.
    if up_steps <= down_steps {
        (up_steps as u8, true)
    } else {
        (down_steps as u8, false)
    }
}
