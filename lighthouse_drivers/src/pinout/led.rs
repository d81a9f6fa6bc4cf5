//! Status LEDs, active low.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

/// Lit while a sensor reports a capture fault
pub const FAULT: PinDef = PinDef::new(Port::B, 15, PinMode::Output);

/// Lit while both sensors have a position fix
pub const FIX: PinDef = PinDef::new(Port::B, 14, PinMode::Output);

/// Lit once the base station info block has been received
pub const TELEMETRY: PinDef = PinDef::new(Port::B, 13, PinMode::Output);
