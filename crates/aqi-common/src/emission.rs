//! CO2 emission estimate derived from AQI and time of day.

use crate::reading::round2;

/// India grid emission factor, kg CO2 per kWh.
const GRID_FACTOR_KG_PER_KWH: f64 = 0.82;

/// Estimate a zone's CO2 emission rate (kg/hr) from its AQI.
///
/// Power demand is approximated from the AQI, scaled by a rush-hour
/// multiplier (morning 07-10, evening 18-21 local time), then converted
/// through the grid emission factor.
pub fn estimate_co2_kg_hr(aqi: f64, local_hour: u32) -> f64 {
    let time_mult = match local_hour {
        7..=10 => 1.7,
        18..=21 => 1.85,
        _ => 1.0,
    };
    let base_power_kw = 500.0 + (aqi / 100.0) * 300.0;
    round2((base_power_kw * time_mult / 1000.0) * GRID_FACTOR_KG_PER_KWH * 8.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_peak_estimate() {
        // aqi=100 -> base 800 kW, mult 1.0 -> 0.8 * 0.82 * 8 = 5.248
        assert_eq!(estimate_co2_kg_hr(100.0, 3), 5.25);
    }

    #[test]
    fn test_morning_peak_higher_than_off_peak() {
        let off_peak = estimate_co2_kg_hr(150.0, 14);
        let morning = estimate_co2_kg_hr(150.0, 8);
        let evening = estimate_co2_kg_hr(150.0, 19);

        assert!(morning > off_peak);
        assert!(evening > morning);
    }

    #[test]
    fn test_scales_with_aqi() {
        assert!(estimate_co2_kg_hr(400.0, 12) > estimate_co2_kg_hr(50.0, 12));
    }

    #[test]
    fn test_peak_hour_boundaries() {
        assert_eq!(estimate_co2_kg_hr(100.0, 7), estimate_co2_kg_hr(100.0, 10));
        assert_eq!(estimate_co2_kg_hr(100.0, 6), estimate_co2_kg_hr(100.0, 11));
    }
}
