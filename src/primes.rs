use std::collections::HashMap;

/// Memoized primality by trial division.
///
/// The cache only ever grows. Callers never ask about indices above
/// [`crate::spiral::MAX_POINTS`], so it holds at most two million entries.
#[derive(Debug, Default)]
pub struct PrimeOracle {
    cache: HashMap<u32, bool>,
}

impl PrimeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_prime(&mut self, n: u32) -> bool {
        if let Some(&known) = self.cache.get(&n) {
            return known;
        }
        let answer = trial_division(n);
        self.cache.insert(n, answer);
        answer
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn trial_division(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let n = n as u64;
    let mut i = 3u64;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sieve(limit: usize) -> Vec<bool> {
        let mut is_prime = vec![true; limit + 1];
        is_prime[0] = false;
        is_prime[1] = false;
        let mut p = 2;
        while p * p <= limit {
            if is_prime[p] {
                let mut multiple = p * p;
                while multiple <= limit {
                    is_prime[multiple] = false;
                    multiple += p;
                }
            }
            p += 1;
        }
        is_prime
    }

    #[test]
    fn small_cases() {
        let mut oracle = PrimeOracle::new();
        assert!(!oracle.is_prime(0));
        assert!(!oracle.is_prime(1));
        assert!(oracle.is_prime(2));
        assert!(oracle.is_prime(3));
        assert!(!oracle.is_prime(4));
        assert!(!oracle.is_prime(9));
        assert!(!oracle.is_prime(25));
        assert!(oracle.is_prime(1_999_993));
    }

    #[test]
    fn matches_sieve_up_to_one_hundred_thousand() {
        let truth = sieve(100_000);
        let mut oracle = PrimeOracle::new();
        for n in 1..=100_000u32 {
            assert_eq!(oracle.is_prime(n), truth[n as usize], "n = {}", n);
        }
    }

    #[test]
    fn answers_are_memoized() {
        let mut oracle = PrimeOracle::new();
        assert_eq!(oracle.cached(), 0);
        oracle.is_prime(97);
        oracle.is_prime(97);
        oracle.is_prime(98);
        assert_eq!(oracle.cached(), 2);
        assert!(oracle.is_prime(97));
    }
}
