/// Fixed-schedule initial dosing before the protocol interval takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingPhaseManager {
    pub loading_injections: u32,
    pub loading_interval_days: u32,
}

impl Default for LoadingPhaseManager {
    fn default() -> Self {
        Self::new(3, 28)
    }
}

impl LoadingPhaseManager {
    pub fn new(loading_injections: u32, loading_interval_days: u32) -> Self {
        Self {
            loading_injections,
            loading_interval_days,
        }
    }

    pub fn is_in_loading_phase(&self, injection_count: u32) -> bool {
        injection_count < self.loading_injections
    }

    pub fn get_interval(&self, injection_count: u32, protocol_interval: u32) -> u32 {
        if self.is_in_loading_phase(injection_count) {
            self.loading_interval_days
        } else {
            protocol_interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_law() {
        let manager = LoadingPhaseManager::default();

        for protocol_interval in [14, 28, 56, 84, 112] {
            for count in 0..3 {
                assert_eq!(manager.get_interval(count, protocol_interval), 28);
                assert!(manager.is_in_loading_phase(count));
            }
            for count in 3..20 {
                assert_eq!(manager.get_interval(count, protocol_interval), protocol_interval);
                assert!(!manager.is_in_loading_phase(count));
            }
        }
    }

    #[test]
    fn test_zero_loading_injections_skips_phase() {
        let manager = LoadingPhaseManager::new(0, 28);
        assert!(!manager.is_in_loading_phase(0));
        assert_eq!(manager.get_interval(0, 56), 56);
    }
}
