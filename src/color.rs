use crate::error::{CasambiError, Result};
use crate::types::ColorTemperatureSource;
use palette::{FromColor, Hsv, Srgb};

/// Step the cloud accepts for color temperature values
const KELVIN_STEP: u32 = 50;

/// Convert mired to kelvin, rounding to the nearest kelvin
pub fn mired_to_kelvin(mired: u32) -> Result<u32> {
    if mired == 0 {
        return Err(CasambiError::invalid("mired", "must be greater than zero"));
    }
    Ok((1_000_000.0 / f64::from(mired)).round() as u32)
}

/// Snap kelvin to the nearest multiple of 50, halves rounding up.
///
/// Values too close to `u32::MAX` to round up saturate at the largest
/// multiple of 50 that fits.
pub fn snap_kelvin(kelvin: u32) -> u32 {
    if kelvin % KELVIN_STEP == 0 {
        return kelvin;
    }
    let step = u64::from(KELVIN_STEP);
    let snapped = (u64::from(kelvin) + step / 2) / step * step;
    u32::try_from(snapped).unwrap_or(u32::MAX - u32::MAX % KELVIN_STEP)
}

/// Resolve a requested color temperature to the kelvin value to send.
///
/// Converts from mired if needed, snaps to a multiple of 50 and clamps into
/// `range`. A range with `max == 0` means the unit reported no bounds and no
/// clamping is applied.
pub fn resolve_color_temperature(
    value: u32,
    source: ColorTemperatureSource,
    range: (u32, u32),
) -> Result<u32> {
    let kelvin = match source {
        ColorTemperatureSource::Kelvin => value,
        ColorTemperatureSource::Mired => mired_to_kelvin(value)?,
    };
    let kelvin = snap_kelvin(kelvin);

    let (min, max) = range;
    if max == 0 {
        return Ok(kelvin);
    }
    if min > max {
        return Err(CasambiError::Protocol(format!(
            "unit reported inverted color temperature range [{}, {}]",
            min, max
        )));
    }
    Ok(kelvin.clamp(min, max))
}

/// Hue and saturation (both in `[0, 1]`) of an 8-bit RGB triple
pub fn rgb_to_hue_sat(red: u8, green: u8, blue: u8) -> (f64, f64) {
    let rgb = Srgb::new(red, green, blue).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(rgb);

    let hue = f64::from(hsv.hue.into_positive_degrees()) / 360.0;
    let sat = f64::from(hsv.saturation);
    (round_to(hue, 3), round_to(sat, 3))
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mired_converts_to_kelvin() {
        assert_eq!(mired_to_kelvin(200).unwrap(), 5000);
        assert_eq!(mired_to_kelvin(153).unwrap(), 6536);
        assert!(mired_to_kelvin(0).is_err());
    }

    #[test]
    fn snaps_to_nearest_fifty() {
        assert_eq!(snap_kelvin(4090), 4100);
        assert_eq!(snap_kelvin(4010), 4000);
        assert_eq!(snap_kelvin(4000), 4000);
        assert_eq!(snap_kelvin(4075), 4100);
    }

    #[test]
    fn mired_input_resolves_before_snapping_and_clamping() {
        let kelvin =
            resolve_color_temperature(200, ColorTemperatureSource::Mired, (2200, 6000)).unwrap();
        assert_eq!(kelvin, 5000);
    }

    #[test]
    fn clamps_into_supported_range() {
        let range = (2200, 6000);
        let resolve = |k| resolve_color_temperature(k, ColorTemperatureSource::Kelvin, range);
        assert_eq!(resolve(7000).unwrap(), 6000);
        assert_eq!(resolve(1000).unwrap(), 2200);
        assert_eq!(resolve(4090).unwrap(), 4100);
    }

    #[test]
    fn huge_kelvin_clamps_to_maximum() {
        assert_eq!(snap_kelvin(u32::MAX), 4_294_967_250);
        let kelvin =
            resolve_color_temperature(u32::MAX, ColorTemperatureSource::Kelvin, (2200, 6000)).unwrap();
        assert_eq!(kelvin, 6000);
    }

    #[test]
    fn missing_range_skips_clamping() {
        let kelvin =
            resolve_color_temperature(9000, ColorTemperatureSource::Kelvin, (0, 0)).unwrap();
        assert_eq!(kelvin, 9000);
    }

    #[test]
    fn hue_and_saturation_of_primaries() {
        assert_eq!(rgb_to_hue_sat(255, 0, 0), (0.0, 1.0));
        assert_eq!(rgb_to_hue_sat(0, 0, 255), (0.667, 1.0));
        assert_eq!(rgb_to_hue_sat(255, 255, 255), (0.0, 0.0));
    }
}
