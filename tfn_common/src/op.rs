/// Generates the std::ops boilerplate for integer newtypes.
///
/// `op!(binary Paise, Add, add)` produces `impl Add for Paise`, and so on for
/// the `inplace` and `unary` forms.
#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trait::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $t {
            fn $method(&mut self, rhs: Self) {
                std::ops::$trait::$method(&mut self.0, rhs.0)
            }
        }
    };
    (unary $t:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(std::ops::$trait::$method(self.0))
            }
        }
    };
}
