/// Conversions between decibels and linear gain.
///
/// ```
/// use spatializer_dsp::DbExt;
/// assert_eq!(0.0f32.db_to_gain(), 1.0);
/// assert_eq!(f32::NEG_INFINITY.db_to_gain(), 0.0);
/// ```
pub trait DbExt {
    fn db_to_gain(self) -> Self;
    fn gain_to_db(self) -> Self;
}

macro_rules! db_impl {
    ($t:ty) => {
        impl DbExt for $t {
            fn db_to_gain(self) -> Self {
                (10.0 as $t).powf(self / 20.0)
            }

            fn gain_to_db(self) -> Self {
                20.0 * self.log10()
            }
        }
    };
}

db_impl!(f32);
db_impl!(f64);
