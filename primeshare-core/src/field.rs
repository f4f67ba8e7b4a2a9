//! Arithmetic in GF(p) for a runtime prime modulus.
//!
//! All element values live in `[0, p)` and are carried as `u64`. The modulus
//! is chosen at configuration time, so unlike compile-time field crates the
//! widths of intermediate products are probed once at construction: when a
//! sum or product of two field elements can overflow 64 bits the affected
//! operation transparently widens (128-bit arithmetic, big integers for
//! exponentiation).

use num_bigint::BigUint;

/// Field sizes that keep all share arithmetic inside 64 bits.
pub const FIELD_SIZE_PRIME_31BITS: u64 = 1401085391;
/// A 62-bit prime modulus.
pub const FIELD_SIZE_PRIME_62BITS: u64 = 3775874107000403461;
/// The biggest prime smaller than 2^63.
pub const FIELD_SIZE_PRIME_63BITS: u64 = 9223372036854775783;

/// A finite field GF(p) with a runtime modulus.
///
/// The type is a small copyable descriptor; all operations take the element
/// values as plain `u64`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gf {
    p: u64,
    /// Whether (p-1)+(p-1) overflows u64 and addition must widen.
    wide_add: bool,
    /// Whether (p-1)*(p-1) overflows u64 and multiplication must widen.
    wide_mul: bool,
}

impl Gf {
    /// Creates a field with the given modulus.
    ///
    /// The modulus is checked for probable primality; a composite modulus is
    /// reported as a warning since interpolation and inverses are then not
    /// guaranteed to work, but construction still succeeds.
    pub fn new(p: u64) -> Self {
        assert!(p >= 2, "field size must be at least 2");
        if !is_probable_prime(p) {
            tracing::warn!("field size {p} is not prime, interpolation will not work");
        }
        let max = (p - 1) as u128;
        Self {
            p,
            wide_add: max + max > u64::MAX as u128,
            wide_mul: max * max > u64::MAX as u128,
        }
    }

    /// The field modulus p.
    #[inline]
    pub fn modulus(&self) -> u64 {
        self.p
    }

    /// The number of bits needed to represent the modulus.
    #[inline]
    pub fn bit_len(&self) -> usize {
        (64 - self.p.leading_zeros()) as usize
    }

    /// Reduces an arbitrary value into `[0, p)`.
    #[inline]
    pub fn reduce(&self, a: u64) -> u64 {
        a % self.p
    }

    /// Computes (a + b) mod p.
    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        if self.wide_add {
            ((a as u128 + b as u128) % self.p as u128) as u64
        } else {
            (a + b) % self.p
        }
    }

    /// Computes (a - b) mod p.
    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        let a = a % self.p;
        let b = b % self.p;
        if a >= b {
            a - b
        } else {
            self.p - (b - a)
        }
    }

    /// Computes (a * b) mod p.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        if self.wide_mul {
            ((a as u128 * b as u128) % self.p as u128) as u64
        } else {
            (a * b) % self.p
        }
    }

    /// Fast exponentiation: (base ^ exponent) mod p.
    pub fn pow(&self, base: u64, exponent: u64) -> u64 {
        let b = BigUint::from(base % self.p);
        let e = BigUint::from(exponent);
        let m = BigUint::from(self.p);
        let r = b.modpow(&e, &m);
        // the result is < p <= 2^63
        r.iter_u64_digits().next().unwrap_or(0)
    }

    /// The multiplicative inverse of `a`, via the group-order identity
    /// a^(p-2). Only meaningful for prime p and non-zero a.
    pub fn inverse(&self, a: u64) -> u64 {
        self.pow(a, self.p - 2)
    }

    /// The Legendre symbol of `a`: 0, 1 or p-1 (the in-field encoding of -1).
    pub fn legendre(&self, a: u64) -> u64 {
        self.pow(a, (self.p - 1) / 2)
    }

    /// The modular square root of `a`, i.e. an x with x² = a mod p.
    ///
    /// Uses the direct formula for p ≡ 3 (mod 4) and the Shanks–Tonelli
    /// algorithm otherwise. Returns 0 if `a` has no square root.
    pub fn sqrt(&self, a: u64) -> u64 {
        if self.legendre(a) != 1 {
            tracing::debug!("input value has no modular square root");
            return 0;
        }
        if self.p % 4 == 3 {
            return self.pow(a, (self.p + 1) / 4);
        }

        // max power of 2 in p-1
        let mut s = self.p - 1;
        let mut e = 0u64;
        while s % 2 == 0 {
            s /= 2;
            e += 1;
        }

        // find a quadratic non-residue
        let mut non_residue = 0;
        for i in 2..self.p {
            if self.legendre(i) == self.p - 1 {
                non_residue = i;
                break;
            }
        }
        if non_residue == 0 {
            tracing::warn!("failed finding quadratic non-residue");
            return 0;
        }

        // guess root and fudge factor, improve until the root is exact
        let mut root = self.pow(a, (s + 1) / 2);
        let mut fudge = self.pow(a, s);
        let mut g = self.pow(non_residue, s);
        let mut r = e;
        loop {
            let mut temp = fudge;
            let mut m = 0;
            while m < r {
                if temp == 1 {
                    break;
                }
                temp = self.mul(temp, temp);
                m += 1;
            }
            if m == 0 {
                return root;
            }
            temp = self.pow(g, 1u64 << (r - m - 1));
            root = self.mul(root, temp);
            g = self.mul(temp, temp);
            fudge = self.mul(fudge, g);
            r = m;
        }
    }

    /// The big-endian bit decomposition of a public value, using exactly
    /// `bit_len()` bits. `bits[0]` is the most significant bit.
    pub fn bits(&self, value: u64) -> Vec<u64> {
        let count = self.bit_len();
        (0..count)
            .map(|i| (value >> (count - i - 1)) & 1)
            .collect()
    }

    /// Folds bit (shares) back into a number (share): Σ bits[i] · 2^(n-1-i).
    ///
    /// Works on public bits and on shares alike, since the fold is linear.
    pub fn number_from_bits(&self, bits: &[u64]) -> u64 {
        let count = self.bit_len();
        let mut result = 0;
        for (i, bit) in bits.iter().take(count).enumerate() {
            result = self.add(result, self.mul(*bit, 1u64 << (count - i - 1)));
        }
        result
    }
}

/// Deterministic Miller–Rabin primality test for u64.
fn is_probable_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    let mul = |a: u64, b: u64| ((a as u128 * b as u128) % n as u128) as u64;
    let pow = |mut base: u64, mut exp: u64| {
        let mut acc = 1u64;
        base %= n;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = mul(acc, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        acc
    };
    // this base set is deterministic for all 64-bit integers
    'witness: for a in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        let mut x = pow(a, d);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..s - 1 {
            x = mul(x, x);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
