use crate::executor::setup::DependencyRecord;

/// Assign a wave to every record.
///
/// Sequential: wave = registration index. Wave-parallel: a step with no step
/// dependencies is in wave 0, any other step runs one wave after its latest
/// dependency, which keeps `wave(consumer) > wave(producer)` for every edge.
///
/// Records only wait on earlier records, so one forward pass suffices.
pub(crate) fn assign_waves(records: &mut [DependencyRecord], parallel: bool) {
    for idx in 0..records.len() {
        let wave = if parallel {
            let (done, rest) = records.split_at(idx);
            rest[0]
                .waits_on
                .iter()
                .map(|&dep| {
                    done[dep]
                        .wave
                        .checked_add(1)
                        .expect("assign_waves: [1]")
                })
                .max()
                .unwrap_or(0)
        } else {
            idx
        };
        records[idx].wave = wave;
    }
}

/// Group record indices by wave, in ascending wave order and registration
/// order within a wave.
pub(crate) fn group_waves(records: &[DependencyRecord]) -> Vec<Vec<usize>> {
    let Some(max_wave) = records.iter().map(|r| r.wave).max() else {
        return Vec::new();
    };
    let mut waves = vec![Vec::new(); max_wave + 1];
    for (idx, record) in records.iter().enumerate() {
        waves[record.wave].push(idx);
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(deps: &[&[usize]]) -> Vec<DependencyRecord> {
        deps.iter()
            .map(|d| DependencyRecord {
                waits_on: d.iter().copied().collect(),
                ..DependencyRecord::default()
            })
            .collect()
    }

    #[test]
    fn parallel_waves_follow_longest_dependency_chain() {
        //   0     1
        //    \   /
        //      2     3
        //      |
        //      4
        let mut recs = records(&[&[], &[], &[0, 1], &[], &[2]]);
        assign_waves(&mut recs, true);
        let waves: Vec<_> = recs.iter().map(|r| r.wave).collect();
        assert_eq!(waves, [0, 0, 1, 0, 2]);
        assert_eq!(group_waves(&recs), vec![vec![0, 1, 3], vec![2], vec![4]]);
    }

    #[test]
    fn sequential_waves_follow_registration_order() {
        let mut recs = records(&[&[], &[], &[0]]);
        assign_waves(&mut recs, false);
        assert_eq!(group_waves(&recs), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn every_edge_points_to_an_earlier_wave() {
        let mut recs = records(&[&[], &[0], &[], &[1, 2], &[0, 3], &[2]]);
        assign_waves(&mut recs, true);
        for rec in &recs {
            for &dep in &rec.waits_on {
                assert!(rec.wave > recs[dep].wave);
            }
        }
    }

    #[test]
    fn no_records_means_no_waves() {
        assert!(group_waves(&[]).is_empty());
    }
}
