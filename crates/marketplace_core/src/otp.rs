//! crates/marketplace_core/src/otp.rs
//!
//! One-time passcode entry: the four input cells, the resend cooldown and the
//! verification state machine that ties them together.
//!
//! Nothing here performs I/O. The `web` service drives `OtpFlow` against the
//! backend and feeds the outcome back in.

/// Number of digits in a one-time passcode.
pub const OTP_LENGTH: usize = 4;

/// Seconds a user waits between two resend requests.
pub const RESEND_COOLDOWN_SECS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("Please enter the complete 4-digit code")]
    Incomplete,
    #[error("Cell {0} does not exist")]
    OutOfRange(usize),
    #[error("The code cannot be edited right now")]
    Locked,
    #[error("A verification is already in progress")]
    AlreadySubmitting,
    #[error("The code has already been verified")]
    AlreadyVerified,
    #[error("No verification is in progress")]
    NotSubmitting,
    #[error("Please wait {0} seconds before requesting a new code")]
    CooldownActive(u32),
}

//=========================================================================================
// Input cells
//=========================================================================================

/// Four single-digit cells with a focus cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpInput {
    cells: [Option<char>; OTP_LENGTH],
    focus: usize,
}

impl OtpInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the text of one cell after an edit.
    ///
    /// Only the last ASCII digit in `text` is kept. An empty `text` clears the
    /// cell; text without any digit leaves it untouched. Entering a digit moves
    /// the focus to the next cell.
    pub fn input(&mut self, index: usize, text: &str) -> Result<(), OtpError> {
        if index >= OTP_LENGTH {
            return Err(OtpError::OutOfRange(index));
        }
        if text.is_empty() {
            self.cells[index] = None;
            self.focus = index;
            return Ok(());
        }
        if let Some(digit) = text.chars().rev().find(|c| c.is_ascii_digit()) {
            self.cells[index] = Some(digit);
            self.focus = (index + 1).min(OTP_LENGTH - 1);
        }
        Ok(())
    }

    /// Backspace in cell `index`: clears it, or steps back when it is already empty.
    pub fn backspace(&mut self, index: usize) -> Result<(), OtpError> {
        if index >= OTP_LENGTH {
            return Err(OtpError::OutOfRange(index));
        }
        if self.cells[index].is_some() {
            self.cells[index] = None;
            self.focus = index;
        } else if index > 0 {
            self.cells[index - 1] = None;
            self.focus = index - 1;
        }
        Ok(())
    }

    /// Fills every cell from pasted text holding at least four digits and
    /// focuses the last cell. Returns `false` (and changes nothing) otherwise.
    pub fn paste(&mut self, text: &str) -> bool {
        let digits: Vec<char> = text.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < OTP_LENGTH {
            return false;
        }
        for (cell, digit) in self.cells.iter_mut().zip(digits) {
            *cell = Some(digit);
        }
        self.focus = OTP_LENGTH - 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// The entered code, once all four cells hold a digit.
    pub fn code(&self) -> Option<String> {
        self.cells.iter().copied().collect::<Option<String>>()
    }

    pub fn cell(&self, index: usize) -> Option<char> {
        self.cells.get(index).copied().flatten()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

//=========================================================================================
// Resend cooldown
//=========================================================================================

/// Countdown gating the "resend code" action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendCooldown {
    remaining: u32,
}

impl Default for ResendCooldown {
    fn default() -> Self {
        Self::new()
    }
}

impl ResendCooldown {
    /// A fresh countdown starting at 60 seconds.
    pub fn new() -> Self {
        Self {
            remaining: RESEND_COOLDOWN_SECS,
        }
    }

    /// One second elapsed. Returns the seconds left, never below zero.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn can_resend(&self) -> bool {
        self.remaining == 0
    }

    pub fn restart(&mut self) {
        self.remaining = RESEND_COOLDOWN_SECS;
    }
}

//=========================================================================================
// Verification state machine
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpPhase {
    /// The user is typing. `error` holds the reason of the last rejection.
    Entering { error: Option<String> },
    Submitting,
    Verified,
}

/// `Entering -> Submitting -> Verified | Entering(with error)`.
#[derive(Debug, Clone)]
pub struct OtpFlow {
    input: OtpInput,
    cooldown: ResendCooldown,
    phase: OtpPhase,
    resending: bool,
}

impl Default for OtpFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpFlow {
    pub fn new() -> Self {
        Self {
            input: OtpInput::new(),
            cooldown: ResendCooldown::new(),
            phase: OtpPhase::Entering { error: None },
            resending: false,
        }
    }

    pub fn phase(&self) -> &OtpPhase {
        &self.phase
    }

    pub fn input(&self) -> &OtpInput {
        &self.input
    }

    pub fn cooldown(&self) -> &ResendCooldown {
        &self.cooldown
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            OtpPhase::Entering { error } => error.as_deref(),
            _ => None,
        }
    }

    fn editable(&mut self) -> Result<&mut OtpInput, OtpError> {
        match self.phase {
            OtpPhase::Entering { ref mut error } => {
                *error = None;
                Ok(&mut self.input)
            }
            _ => Err(OtpError::Locked),
        }
    }

    pub fn enter(&mut self, index: usize, text: &str) -> Result<(), OtpError> {
        self.editable()?.input(index, text)
    }

    pub fn backspace(&mut self, index: usize) -> Result<(), OtpError> {
        self.editable()?.backspace(index)
    }

    pub fn paste(&mut self, text: &str) -> Result<bool, OtpError> {
        Ok(self.editable()?.paste(text))
    }

    /// Submit is enabled only while entering with four digits present.
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, OtpPhase::Entering { .. }) && self.input.is_complete()
    }

    /// Moves to `Submitting` and hands back the code to send.
    pub fn begin_submit(&mut self) -> Result<String, OtpError> {
        match self.phase {
            OtpPhase::Submitting => return Err(OtpError::AlreadySubmitting),
            OtpPhase::Verified => return Err(OtpError::AlreadyVerified),
            OtpPhase::Entering { .. } => {}
        }
        if self.resending {
            return Err(OtpError::AlreadySubmitting);
        }
        let code = self.input.code().ok_or(OtpError::Incomplete)?;
        self.phase = OtpPhase::Submitting;
        Ok(code)
    }

    /// Feeds the verification outcome back. `Err` carries the message to show.
    pub fn finish_submit(&mut self, outcome: Result<(), String>) -> Result<(), OtpError> {
        if self.phase != OtpPhase::Submitting {
            return Err(OtpError::NotSubmitting);
        }
        self.phase = match outcome {
            Ok(()) => OtpPhase::Verified,
            Err(message) => OtpPhase::Entering {
                error: Some(message),
            },
        };
        Ok(())
    }

    /// One second of the resend countdown elapsed.
    pub fn tick(&mut self) -> u32 {
        self.cooldown.tick()
    }

    pub fn can_resend(&self) -> bool {
        self.cooldown.can_resend()
            && !self.resending
            && matches!(self.phase, OtpPhase::Entering { .. })
    }

    /// Claims the resend action. Refused while the countdown is still running
    /// and while a code is being verified.
    pub fn begin_resend(&mut self) -> Result<(), OtpError> {
        match self.phase {
            OtpPhase::Verified => return Err(OtpError::AlreadyVerified),
            OtpPhase::Submitting => return Err(OtpError::AlreadySubmitting),
            OtpPhase::Entering { .. } => {}
        }
        if !self.cooldown.can_resend() {
            return Err(OtpError::CooldownActive(self.cooldown.remaining()));
        }
        if self.resending {
            return Err(OtpError::AlreadySubmitting);
        }
        self.resending = true;
        Ok(())
    }

    /// A successful resend starts a fresh countdown and clears the old code.
    pub fn finish_resend(&mut self, outcome: Result<(), String>) {
        self.resending = false;
        match outcome {
            Ok(()) => {
                self.cooldown.restart();
                self.input.clear();
                if let OtpPhase::Entering { error } = &mut self.phase {
                    *error = None;
                }
            }
            Err(message) => {
                if let OtpPhase::Entering { error } = &mut self.phase {
                    *error = Some(message);
                }
            }
        }
    }
}
