//! Branch prediction: the same conditional sum over sorted data, random
//! data, and random data with the branch replaced by a mask.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::hint::black_box;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const THRESHOLD: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Sorted,
    Random,
    BranchFree,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Sorted => "sorted",
            Variant::Random => "random",
            Variant::BranchFree => "branch-free",
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sorted" => Ok(Variant::Sorted),
            "random" => Ok(Variant::Random),
            "branch-free" => Ok(Variant::BranchFree),
            other => Err(format!(
                "unknown variant '{other}', expected sorted, random or branch-free"
            )),
        }
    }
}

pub struct BranchFactory;

impl DemoFactory for BranchFactory {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn about(&self) -> &'static str {
        "conditional sum over sorted vs random data, and a branch-free rewrite"
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new("branch", self.name())
            .with_option("variant", "random")
            .with_option("size", 32_768);
        wl.iterations = 10_000;
        wl.warmup_iterations = 1_000;
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        let variant: Variant = wl.option("variant", Variant::Random)?;
        let size = wl.option("size", 32_768usize)?;
        anyhow::ensure!(
            i32::try_from(size).is_ok(),
            "size {size} does not fit the i32 data set"
        );
        Ok(Box::new(BranchDemo {
            variant,
            data: Arc::new(dataset(variant, size)),
            last_sum: Arc::new(AtomicI64::new(0)),
        }))
    }
}

struct BranchDemo {
    variant: Variant,
    data: Arc<Vec<i32>>,
    last_sum: Arc<AtomicI64>,
}

impl Demo for BranchDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Latency
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let data = self.data.clone();
        let last_sum = self.last_sum.clone();
        let branch_free = self.variant == Variant::BranchFree;
        Arc::new(move || {
            let start = Instant::now();
            let sum = if branch_free {
                sum_if_ge_128_branch_free(black_box(&data))
            } else {
                sum_if_ge_128(black_box(&data))
            };
            let elapsed = start.elapsed().as_nanos() as i64;
            last_sum.store(sum, Ordering::Relaxed);
            elapsed
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        vec![
            ("variant".to_string(), self.variant.as_str().to_string()),
            ("elements".to_string(), self.data.len().to_string()),
            (
                "sum".to_string(),
                self.last_sum.load(Ordering::Relaxed).to_string(),
            ),
        ]
    }
}

/// Sorted data is `0..size`; random data is uniform in `0..256` from a
/// fixed seed, so runs are comparable.
pub fn dataset(variant: Variant, size: usize) -> Vec<i32> {
    match variant {
        Variant::Sorted => (0..=i32::MAX).take(size).collect(),
        Variant::Random | Variant::BranchFree => {
            let mut rng = StdRng::seed_from_u64(42);
            (0..size).map(|_| rng.gen_range(0..256)).collect()
        }
    }
}

pub fn sum_if_ge_128(data: &[i32]) -> i64 {
    let mut sum = 0i64;
    for &v in data {
        if v >= THRESHOLD {
            sum += v as i64;
        }
    }
    sum
}

pub fn sum_if_ge_128_branch_free(data: &[i32]) -> i64 {
    let mut sum = 0i64;
    for &v in data {
        // all ones when v >= 128, zero otherwise; compiles to a set, not a jump
        let mask = -i32::from(v >= THRESHOLD);
        sum += (v & mask) as i64;
    }
    sum
}
