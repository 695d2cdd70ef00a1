//! Index-based gap filling

/// Fill absent values in place
///
/// Interior gaps are linearly interpolated over the index between the two
/// flanking present values. Leading gaps take the first present value and
/// trailing gaps the last. A column with no present value is left untouched.
pub fn fill_linear(values: &mut [Option<f64>]) {
    let present: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (present.first(), present.last()) else {
        return;
    };

    let first_value = values[first];
    let last_value = values[last];
    for v in &mut values[..first] {
        *v = first_value;
    }
    for v in &mut values[last + 1..] {
        *v = last_value;
    }

    for pair in present.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (Some(y0), Some(y1)) = (values[lo], values[hi]) else {
            continue;
        };
        let span = (hi - lo) as f64;
        for i in lo + 1..hi {
            let alpha = (i - lo) as f64 / span;
            values[i] = Some(y0 + (y1 - y0) * alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_interior_gap_is_linear() {
        let mut values = vec![Some(10.0), None, None, Some(40.0)];
        fill_linear(&mut values);
        assert_eq!(values, vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)]);
    }

    #[test]
    fn test_edges_take_nearest_value() {
        let mut values = vec![None, None, Some(5.0), None, Some(7.0), None];
        fill_linear(&mut values);
        assert_eq!(
            values,
            vec![Some(5.0), Some(5.0), Some(5.0), Some(6.0), Some(7.0), Some(7.0)]
        );
    }

    #[test]
    fn test_all_absent_stays_absent() {
        let mut values = vec![None, None, None];
        fill_linear(&mut values);
        assert!(values.iter().all(Option::is_none));

        let mut empty: Vec<Option<f64>> = Vec::new();
        fill_linear(&mut empty);
        assert!(empty.is_empty());
    }

    proptest! {
        #[test]
        fn prop_no_gap_survives_when_any_value_exists(
            values in prop::collection::vec(prop::option::of(-100.0f64..3000.0), 1..100)
        ) {
            let any_present = values.iter().any(Option::is_some);
            let mut filled = values.clone();
            fill_linear(&mut filled);

            if any_present {
                prop_assert!(filled.iter().all(Option::is_some));
            }
            for (orig, out) in values.iter().zip(&filled) {
                if orig.is_some() {
                    prop_assert_eq!(orig, out);
                }
            }
        }
    }
}
