/// [Cantor pairing function][cantor-pairing].
///
/// ```text
/// (a, b) -> (a + b) * (a + b + 1) / 2 + b
/// ```
///
/// Wraps on overflow: the result is only used as a hash.
///
/// [cantor-pairing]: https://en.wikipedia.org/wiki/Pairing_function#Cantor_pairing_function
pub fn pairing_cantor(a: u64, b: u64) -> u64 {
    let s = a.wrapping_add(b);
    (s.wrapping_mul(s.wrapping_add(1)) / 2).wrapping_add(b)
}

/// Pairing function for two values, as used by the node and operator tables.
///
/// ```text
/// (a, b) -> (a + b) * (a + b + 1) / 2 + a
/// ```
pub fn pairing2(a: u64, b: u64) -> u64 {
    pairing_cantor(b, a)
}

/// Pairing function for three values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(c, pairing2(a, b))
}

pub trait MyHash {
    /// Hash used to pick a bucket (node table) or a slot (operator caches).
    fn hash(&self) -> u64;
}

impl<const N: usize> MyHash for [u32; N] {
    fn hash(&self) -> u64 {
        let mut it = self.iter();
        let Some(&first) = it.next() else {
            return 0;
        };
        it.fold(first as u64, |h, &x| pairing2(h, x as u64))
    }
}

pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Smallest prime `>= n`.
pub fn prime_gte(n: usize) -> usize {
    let mut n = n.max(2);
    while !is_prime(n) {
        n += 1;
    }
    n
}

/// Largest prime `<= n`, or `n` itself when there is none.
pub fn prime_lte(n: usize) -> usize {
    let mut m = n;
    while m >= 2 {
        if is_prime(m) {
            return m;
        }
        m -= 1;
    }
    n
}
