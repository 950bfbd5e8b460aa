//! The command protocol understood by the robot firmware.
//!
//! Every command is a 3 byte ASCII token: axis (`u`, `d`, `l`, `r`), unit (`1`, `2`) and edge
//! (`n` when a button is pressed, `f` when it is released). For example `u1n` starts driving unit
//! 1 forward, and `u1f` stops it again.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use crate::device::constants::{press_delay, release_delay};
use crate::error::CommandParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Up,
    Down,
    Left,
    Right,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Up, Axis::Down, Axis::Left, Axis::Right];

    pub fn symbol(&self) -> u8 {
        match self {
            Axis::Up => b'u',
            Axis::Down => b'd',
            Axis::Left => b'l',
            Axis::Right => b'r',
        }
    }

    fn from_symbol(symbol: u8) -> Option<Axis> {
        Axis::ALL.into_iter().find(|axis| axis.symbol() == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    One,
    Two,
}

impl Unit {
    pub const ALL: [Unit; 2] = [Unit::One, Unit::Two];

    pub fn symbol(&self) -> u8 {
        match self {
            Unit::One => b'1',
            Unit::Two => b'2',
        }
    }

    fn from_symbol(symbol: u8) -> Option<Unit> {
        Unit::ALL.into_iter().find(|unit| unit.symbol() == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Press,
    Release,
}

impl Edge {
    pub fn symbol(&self) -> u8 {
        match self {
            Edge::Press => b'n',
            Edge::Release => b'f',
        }
    }

    fn from_symbol(symbol: u8) -> Option<Edge> {
        match symbol {
            b'n' => Some(Edge::Press),
            b'f' => Some(Edge::Release),
            _ => None,
        }
    }

    /// The minimum spacing the firmware needs after a command of this edge type.
    pub fn delay(&self) -> Duration {
        match self {
            Edge::Press => press_delay(),
            Edge::Release => release_delay(),
        }
    }
}

/// One of the 8 directional buttons of the remote (4 axes for each of the 2 robot units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Button {
    pub axis: Axis,
    pub unit: Unit,
}

impl Button {
    pub const COUNT: usize = 8;

    pub fn new(axis: Axis, unit: Unit) -> Self {
        Button { axis, unit }
    }

    pub fn all() -> impl Iterator<Item = Button> {
        Unit::ALL
            .into_iter()
            .flat_map(|unit| Axis::ALL.into_iter().map(move |axis| Button::new(axis, unit)))
    }

    /// A dense index in `0..Button::COUNT`
    pub fn index(&self) -> usize {
        let axis = match self.axis {
            Axis::Up => 0,
            Axis::Down => 1,
            Axis::Left => 2,
            Axis::Right => 3,
        };
        let unit = match self.unit {
            Unit::One => 0,
            Unit::Two => 1,
        };
        unit * Axis::ALL.len() + axis
    }

    pub fn code(&self, edge: Edge) -> CommandCode {
        CommandCode { button: *self, edge }
    }
}

impl Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.axis.symbol() as char, self.unit.symbol() as char)
    }
}

impl FromStr for Button {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(CommandParseError::InvalidButton { input: s.to_string() });
        }

        match (Axis::from_symbol(bytes[0]), Unit::from_symbol(bytes[1])) {
            (Some(axis), Some(unit)) => Ok(Button::new(axis, unit)),
            _ => Err(CommandParseError::InvalidButton { input: s.to_string() }),
        }
    }
}

/// A single button edge, written to the TX characteristic as 3 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandCode {
    button: Button,
    edge: Edge,
}

impl CommandCode {
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.button.axis.symbol(), self.button.unit.symbol(), self.edge.symbol()]
    }

    pub fn button(&self) -> Button {
        self.button
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }
}

impl Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.button, self.edge.symbol() as char)
    }
}

impl FromStr for CommandCode {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 {
            return Err(CommandParseError::InvalidCommand { input: s.to_string() });
        }

        let button: Button = s
            .get(..2)
            .ok_or_else(|| CommandParseError::InvalidCommand { input: s.to_string() })?
            .parse()
            .map_err(|_| CommandParseError::InvalidCommand { input: s.to_string() })?;
        let edge = Edge::from_symbol(bytes[2])
            .ok_or_else(|| CommandParseError::InvalidCommand { input: s.to_string() })?;

        Ok(button.code(edge))
    }
}
