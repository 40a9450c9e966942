//! Property-based tests for the chromosome operators and the random stream.

use genvarsel::{chromosome::Chromosome, evolution::Control, rng::RandomStream, strategy::partition};
use proptest::prelude::*;

fn control(size: usize, min: usize, max: usize, mutation: f64) -> Control {
    Control::builder()
        .population_size(2)
        .chromosome_size(size)
        .min_variables(min)
        .max_variables(max)
        .mutation_probability(mutation)
        .build()
        .unwrap()
}

/// Universe size together with a valid `(min, max)` variable range.
fn bounds() -> impl Strategy<Value = (usize, usize, usize)> {
    (2usize..150).prop_flat_map(|size| {
        // a single admissible subset could not fill a population of two
        (1..=size).prop_flat_map(move |max| (Just(size), 0..=max.min(size - 1), Just(max)))
    })
}

proptest! {
    #[test]
    fn random_chromosome_respects_bounds((size, min, max) in bounds(), seed in any::<u32>()) {
        let ctrl = control(size, min, max, 0.1);
        let mut rng = RandomStream::new(seed);
        let c = Chromosome::random(&ctrl, &mut rng);
        prop_assert!(c.variable_count() >= min.max(1));
        prop_assert!(c.variable_count() <= max);
        prop_assert_eq!(c.selected_indices().len(), c.variable_count());
        prop_assert!(c.selected_indices().iter().all(|&i| i < size));
    }

    #[test]
    fn mutation_respects_bounds(
        (size, min, max) in bounds(),
        mutation in 0.0f64..0.99,
        seed in any::<u32>()
    ) {
        let ctrl = control(size, min, max, mutation);
        let mut rng = RandomStream::new(seed);
        let mut c = Chromosome::random(&ctrl, &mut rng);
        for _ in 0..20 {
            c.mutate(&ctrl, &mut rng);
            prop_assert!((min.max(1)..=max).contains(&c.variable_count()));
        }
    }

    #[test]
    fn crossover_then_repair_respects_bounds((size, min, max) in bounds(), seed in any::<u32>()) {
        let ctrl = control(size, min, max, 0.0);
        let mut rng = RandomStream::new(seed);
        let a = Chromosome::random(&ctrl, &mut rng);
        let b = Chromosome::random(&ctrl, &mut rng);
        let (mut c1, mut c2) = a.crossover(&b, &mut rng).unwrap();
        prop_assert_eq!(
            c1.variable_count() + c2.variable_count(),
            a.variable_count() + b.variable_count()
        );
        for child in [&mut c1, &mut c2] {
            if child.variable_count() > 0 {
                child.repair(&ctrl, &mut rng);
                prop_assert!((min.max(1)..=max).contains(&child.variable_count()));
            }
        }
    }

    #[test]
    fn equality_matches_selected_indices(
        size in 1usize..130,
        first in prop::collection::vec(any::<prop::sample::Index>(), 0..20),
        second in prop::collection::vec(any::<prop::sample::Index>(), 0..20)
    ) {
        let first: Vec<usize> = first.iter().map(|i| i.index(size)).collect();
        let second: Vec<usize> = second.iter().map(|i| i.index(size)).collect();
        let a = Chromosome::from_indices(size, &first).unwrap();
        let b = Chromosome::from_indices(size, &second).unwrap();

        prop_assert_eq!(&a, &a.clone());
        prop_assert_eq!(a == b, b == a);
        prop_assert_eq!(a == b, a.selected_indices() == b.selected_indices());
        prop_assert_eq!(a.to_mask().iter().filter(|&&bit| bit).count(), a.variable_count());
    }

    #[test]
    fn equal_seeds_give_equal_streams(seed in any::<u32>()) {
        let mut first = RandomStream::new(seed);
        let mut second = RandomStream::new(seed);
        for _ in 0..2_000 {
            prop_assert_eq!(first.next32(), second.next32());
        }
    }

    #[test]
    fn uniform_stays_in_range(seed in any::<u32>(), min in -100.0f64..100.0, range in 0.001f64..50.0) {
        let mut rng = RandomStream::new(seed);
        for _ in 0..200 {
            let value = rng.uniform(min, range);
            prop_assert!(value >= min && value <= min + range);
        }
    }

    #[test]
    fn partition_tiles_population(population in 2usize..500, threads in 1usize..16) {
        let ranges = partition(population, threads);
        prop_assert_eq!(ranges.len(), threads);
        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            next = range.end;
        }
        prop_assert_eq!(next, population);
        let longest = ranges.iter().map(|r| r.len()).max().unwrap();
        let shortest = ranges.iter().map(|r| r.len()).min().unwrap();
        prop_assert!(longest - shortest <= 1);
    }
}
