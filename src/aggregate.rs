#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Averaging {
    Micro,
    Macro,
}

impl Averaging {
    pub const ALL: [Averaging; 2] = [Averaging::Micro, Averaging::Macro];

    pub fn label(self) -> &'static str {
        match self {
            Averaging::Micro => "MICRO",
            Averaging::Macro => "MACRO",
        }
    }
}

pub fn average(method: Averaging, groups: &[Vec<Option<f64>>]) -> Option<f64> {
    match method {
        Averaging::Micro => micro_average(groups),
        Averaging::Macro => macro_average(groups),
    }
}

pub fn micro_average(groups: &[Vec<Option<f64>>]) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0_usize;
    for group in groups {
        for value in group.iter().flatten() {
            total += *value;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

pub fn macro_average(groups: &[Vec<Option<f64>>]) -> Option<f64> {
    let mut group_means = Vec::new();
    for group in groups {
        let values: Vec<f64> = group.iter().flatten().copied().collect();
        if values.is_empty() {
            continue;
        }
        group_means.push(values.iter().sum::<f64>() / values.len() as f64);
    }

    if group_means.is_empty() {
        None
    } else {
        Some(group_means.iter().sum::<f64>() / group_means.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::{Averaging, average, macro_average, micro_average};

    #[test]
    fn micro_pools_all_requests_while_macro_weights_tasks_equally() {
        let groups = vec![vec![Some(100.0), Some(100.0)], vec![Some(0.0)]];

        let micro = micro_average(&groups).expect("micro should be evaluable");
        assert!((micro - 200.0 / 3.0).abs() < 1e-9);

        let macro_value = macro_average(&groups).expect("macro should be evaluable");
        assert!((macro_value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn non_evaluable_requests_do_not_dilute_either_average() {
        let groups = vec![vec![Some(80.0), None], vec![None]];
        assert_eq!(micro_average(&groups), Some(80.0));
        assert_eq!(macro_average(&groups), Some(80.0));
    }

    #[test]
    fn all_non_evaluable_yields_no_aggregate() {
        let groups = vec![vec![None, None], vec![None]];
        assert_eq!(micro_average(&groups), None);
        assert_eq!(macro_average(&groups), None);
        assert_eq!(micro_average(&[]), None);
        assert_eq!(macro_average(&[]), None);
    }

    #[test]
    fn single_group_collapses_micro_and_macro() {
        let groups = vec![vec![Some(10.0), Some(20.0), Some(60.0)]];
        let micro = micro_average(&groups).expect("micro should be evaluable");
        let macro_value = macro_average(&groups).expect("macro should be evaluable");
        assert!((micro - 30.0).abs() < 1e-9);
        assert!((macro_value - 30.0).abs() < 1e-9);
    }

    #[test]
    fn macro_stays_within_range_of_group_means() {
        let groups = vec![
            vec![Some(10.0), Some(30.0)],
            vec![Some(90.0)],
            vec![Some(40.0), Some(60.0), None],
        ];
        let macro_value = macro_average(&groups).expect("macro should be evaluable");
        assert!(macro_value >= 20.0);
        assert!(macro_value <= 90.0);
    }

    #[test]
    fn average_dispatches_on_method() {
        let groups = vec![vec![Some(100.0), Some(100.0)], vec![Some(0.0)]];
        assert_eq!(average(Averaging::Micro, &groups), micro_average(&groups));
        assert_eq!(average(Averaging::Macro, &groups), macro_average(&groups));
    }
}
