//! Property-based tests for audio domain math.
//! Verifies invariants hold for ALL valid inputs, not just fixed examples.

use platform::audio_types::{FmFrequency, NativeVolume, VolumePercent};
use platform::settings::Settings;

proptest::proptest! {
    /// VolumePercent::new never panics for any u8 input (clamps to 100).
    #[test]
    fn volume_percent_new_clamps(pct in 0u8..=255u8) {
        let v = VolumePercent::new(pct);
        assert!(v.get() <= 100);
        assert_eq!(v.get(), pct.min(100));
    }

    /// Higher volume → lower or equal attenuation (monotone inverse relationship).
    #[test]
    fn native_volume_is_monotone_inverse_of_volume(a in 0u8..=100u8, b in 0u8..=100u8) {
        let na = NativeVolume::from_volume(VolumePercent::new(a));
        let nb = NativeVolume::from_volume(VolumePercent::new(b));
        if a > b {
            assert!(na.get() <= nb.get(),
                "volume {} → native {} should be <= volume {} → native {}",
                a, na.get(), b, nb.get());
        } else if a < b {
            assert!(na.get() >= nb.get(),
                "volume {} → native {} should be >= volume {} → native {}",
                a, na.get(), b, nb.get());
        }
    }

    /// The rounded conversion never strays more than half a step from the
    /// exact value (100 - v) * 2.55.
    #[test]
    fn native_volume_is_rounded(pct in 0u8..=100u8) {
        let native = f32::from(NativeVolume::from_volume(VolumePercent::new(pct)).get());
        let exact = f32::from(100 - pct) * 2.55;
        assert!((native - exact).abs() <= 0.5 + 1e-3,
            "volume {} → native {} but exact {}", pct, native, exact);
    }

    /// Every hundredth inside the band is accepted, via either constructor.
    #[test]
    fn fm_frequency_band_accepts(h in 8_750u16..=10_800u16) {
        let f = FmFrequency::from_hundredths(h).unwrap();
        assert_eq!(f.hundredths(), h);
        let via_mhz = FmFrequency::from_mhz(f.mhz()).unwrap();
        assert_eq!(via_mhz.hundredths(), h);
    }

    /// Everything outside the band is rejected.
    #[test]
    fn fm_frequency_outside_band_rejected(h in proptest::prop_oneof![0u16..8_750u16, 10_801u16..=u16::MAX]) {
        assert!(FmFrequency::from_hundredths(h).is_err());
    }

    /// Arbitrary EEPROM contents never panic the loader.
    #[test]
    fn settings_loader_never_panics(bytes in proptest::collection::vec(proptest::num::u8::ANY, 128)) {
        let mut image = [0u8; Settings::IMAGE_SIZE];
        image.copy_from_slice(&bytes);
        let s = Settings::load_or_default(&image);
        assert!(s.music_volume.get() <= 100);
    }
}
