use rand::Rng;

use crate::Population;

/**
`ln(exp(a) + exp(b))`, without leaving log space.

```rust
# use model::util::ln_add_exp;
assert!((ln_add_exp(2_f64.ln(), 3_f64.ln()) - 5_f64.ln()).abs() < 1e-12);
assert_eq!(ln_add_exp(f64::NEG_INFINITY, 1.), 1.);
```
 */
pub fn ln_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a < b { (b, a) } else { (a, b) };
    hi + (lo - hi).exp().ln_1p()
}

/// Pick one of `options` with probability proportional to its count. Returns
/// `None` if all counts are zero.
pub fn pick_by_count<T: Copy, R: Rng + ?Sized>(
    options: &[(T, Population)],
    rng: &mut R,
) -> Option<T> {
    let total: u64 = options.iter().map(|(_, c)| u64::from(*c)).sum();
    if total == 0 {
        return None;
    }
    let mut u = rng.gen_range(0..total);
    for (item, count) in options {
        let c = u64::from(*count);
        if u < c {
            return Some(*item);
        }
        u -= c;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pick_by_count_skips_empty_options() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = [(0_usize, 0), (1, 5), (2, 0)];
        for _ in 0..100 {
            assert_eq!(pick_by_count(&options, &mut rng), Some(1));
        }
        assert_eq!(pick_by_count::<usize, _>(&[(3, 0)], &mut rng), None);
    }

    #[test]
    fn pick_by_count_is_proportional() {
        let mut rng = StdRng::seed_from_u64(2);
        let options = [('a', 1), ('b', 3)];
        let n = 20_000;
        let b = (0..n)
            .filter(|_| pick_by_count(&options, &mut rng) == Some('b'))
            .count();
        assert!((b as f64 / n as f64 - 0.75).abs() < 0.02);
    }
}
