// Every value exchanged between tasks is one of these. The set is closed:
// the task graph is fixed, so is the list of edges.
//
// Each signal is written at its producer's rate. The divisor is that rate
// expressed against the 200 Hz base tick and decides which double-buffer slot
// a given tick maps to (see store.rs).

/// Identifier of one produced signal.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    // 200 Hz actuators
    Thrust = 0,
    DeltaE = 1,
    // 200 Hz plant outputs
    Va = 2,
    Vz = 3,
    Q = 4,
    Az = 5,
    H = 6,
    // 100 Hz filter outputs
    VaFiltered = 7,
    VzFiltered = 8,
    QFiltered = 9,
    AzFiltered = 10,
    HFiltered = 11,
    // 10 Hz outer-loop set-points
    VaCommand = 12,
    HCommand = 13,
    // 50 Hz control
    VzCommand = 14,
    DeltaThC = 15,
    DeltaEC = 16,
    // 50 Hz actuator demands
    ThrottleDemand = 17,
    ElevatorDemand = 18,
}

impl Signal {
    pub const COUNT: usize = 19;

    pub const ALL: [Signal; Self::COUNT] = [
        Signal::Thrust,
        Signal::DeltaE,
        Signal::Va,
        Signal::Vz,
        Signal::Q,
        Signal::Az,
        Signal::H,
        Signal::VaFiltered,
        Signal::VzFiltered,
        Signal::QFiltered,
        Signal::AzFiltered,
        Signal::HFiltered,
        Signal::VaCommand,
        Signal::HCommand,
        Signal::VzCommand,
        Signal::DeltaThC,
        Signal::DeltaEC,
        Signal::ThrottleDemand,
        Signal::ElevatorDemand,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Producer period in base ticks (1 = 200 Hz, 2 = 100 Hz, 4 = 50 Hz, 20 = 10 Hz).
    #[inline]
    pub fn divisor(self) -> u64 {
        match self {
            Signal::Thrust
            | Signal::DeltaE
            | Signal::Va
            | Signal::Vz
            | Signal::Q
            | Signal::Az
            | Signal::H => 1,
            Signal::VaFiltered
            | Signal::VzFiltered
            | Signal::QFiltered
            | Signal::AzFiltered
            | Signal::HFiltered => 2,
            Signal::VzCommand
            | Signal::DeltaThC
            | Signal::DeltaEC
            | Signal::ThrottleDemand
            | Signal::ElevatorDemand => 4,
            Signal::VaCommand | Signal::HCommand => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Thrust => "thrust",
            Signal::DeltaE => "delta_e",
            Signal::Va => "va",
            Signal::Vz => "vz",
            Signal::Q => "q",
            Signal::Az => "az",
            Signal::H => "h",
            Signal::VaFiltered => "va_filtered",
            Signal::VzFiltered => "vz_filtered",
            Signal::QFiltered => "q_filtered",
            Signal::AzFiltered => "az_filtered",
            Signal::HFiltered => "h_filtered",
            Signal::VaCommand => "va_command",
            Signal::HCommand => "h_command",
            Signal::VzCommand => "vz_command",
            Signal::DeltaThC => "delta_th_c",
            Signal::DeltaEC => "delta_e_c",
            Signal::ThrottleDemand => "throttle_demand",
            Signal::ElevatorDemand => "elevator_demand",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_ordered_by_index() {
        for (i, sig) in Signal::ALL.iter().enumerate() {
            assert_eq!(sig.index(), i, "{sig} is out of place");
        }
    }

    #[test]
    fn divisors_divide_the_hyperperiod() {
        for sig in Signal::ALL {
            assert_eq!(20 % sig.divisor(), 0, "{sig} is not harmonic");
        }
    }
}
