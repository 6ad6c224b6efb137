use std::fmt;
use std::str::FromStr;

use super::errors::FormatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    BP,
    FRAG,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Unit::BP => write!(f, "BP"),
            Unit::FRAG => write!(f, "FRAG"),
        }
    }
}

impl FromStr for Unit {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BP" => Ok(Unit::BP),
            "FRAG" => Ok(Unit::FRAG),
            other => Err(FormatError::new(format!("unknown unit {}", other))),
        }
    }
}

/// One resolution level: a unit and a bin size in that unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HiCZoom {
    unit: Unit,
    bin_size: u32,
}

impl HiCZoom {
    pub fn new(unit: Unit, bin_size: u32) -> HiCZoom {
        HiCZoom { unit, bin_size }
    }

    pub fn bp(bin_size: u32) -> HiCZoom {
        HiCZoom::new(Unit::BP, bin_size)
    }

    pub fn frag(bin_size: u32) -> HiCZoom {
        HiCZoom::new(Unit::FRAG, bin_size)
    }

    pub fn get_unit(&self) -> Unit {
        self.unit
    }

    pub fn get_bin_size(&self) -> u32 {
        self.bin_size
    }

    pub fn get_key(&self) -> String {
        format!("{}_{}", self.unit, self.bin_size)
    }
}

impl fmt::Display for HiCZoom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.unit, self.bin_size)
    }
}

impl FromStr for HiCZoom {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '_');
        let unit = parts.next().unwrap_or("").parse::<Unit>()?;
        let bin_size = parts.next()
            .and_then(|b| b.parse::<u32>().ok())
            .ok_or_else(|| FormatError::new(format!("bad zoom key {}", s)))?;
        Ok(HiCZoom::new(unit, bin_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_key_round_trips() {
        let zoom = HiCZoom::bp(25_000);
        assert_eq!(zoom.get_key(), "BP_25000");
        assert_eq!("BP_25000".parse::<HiCZoom>().unwrap(), zoom);
        assert_eq!("FRAG_5".parse::<HiCZoom>().unwrap(), HiCZoom::frag(5));
    }

    #[test]
    fn bad_zoom_key_is_rejected() {
        assert!("BP".parse::<HiCZoom>().is_err());
        assert!("KB_100".parse::<HiCZoom>().is_err());
        assert!("BP_x".parse::<HiCZoom>().is_err());
    }
}
