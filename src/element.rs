/// Scalar conversions shared by the volume and plane math.
///
/// Every voxel type the loaders can produce implements this. `from_f64`
/// uses Rust's saturating float-to-int casts, which truncate toward zero
/// for in-range values the same way numpy's `astype` does.
pub(crate) trait Element: Copy + PartialOrd + bytemuck::Pod + 'static {
    const ZERO: Self;
    /// Little-endian numpy dtype descriptor, e.g. `<i2`.
    const NPY_DESCR: &'static str;

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $zero:expr, $descr:expr) => {
        impl Element for $t {
            const ZERO: Self = $zero;
            const NPY_DESCR: &'static str = $descr;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }
    };
}

impl_element!(u8, 0, "|u1");
impl_element!(i16, 0, "<i2");
impl_element!(u16, 0, "<u2");
impl_element!(i32, 0, "<i4");
impl_element!(f32, 0.0, "<f4");
impl_element!(f64, 0.0, "<f8");
