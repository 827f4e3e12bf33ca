//! Dynamic variables
//!
//! Variables whose value is computed on each reference rather than
//! stored: `RANDOM`, `SECONDS`, `UID`, `EUID`, `PPID`. A stored binding
//! of the same name shadows the dynamic one.

use rand::Rng;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct DynamicVars {
    start: Instant,
}

impl Default for DynamicVars {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicVars {
    pub fn new() -> Self {
        DynamicVars {
            start: Instant::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "RANDOM" => Some(rand::thread_rng().gen_range(0..32768i32).to_string()),
            "SECONDS" => Some(self.start.elapsed().as_secs().to_string()),
            "UID" => Some(unsafe { libc::getuid() }.to_string()),
            "EUID" => Some(unsafe { libc::geteuid() }.to_string()),
            "PPID" => Some(nix::unistd::getppid().to_string()),
            _ => None,
        }
    }

    pub fn is_dynamic(name: &str) -> bool {
        matches!(name, "RANDOM" | "SECONDS" | "UID" | "EUID" | "PPID")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_is_in_range() {
        let dy = DynamicVars::new();
        for _ in 0..100 {
            let n: i32 = dy.get("RANDOM").unwrap().parse().unwrap();
            assert!((0..32768).contains(&n));
        }
    }

    #[test]
    fn uid_matches_process() {
        let dy = DynamicVars::new();
        assert_eq!(
            dy.get("UID").unwrap(),
            unsafe { libc::getuid() }.to_string()
        );
    }

    #[test]
    fn unknown_names_are_not_dynamic() {
        assert!(!DynamicVars::is_dynamic("PATH"));
        let dy = DynamicVars::new();
        assert!(dy.get("PATH").is_none());
    }
}
