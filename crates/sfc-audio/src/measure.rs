//! Measurement sessions over an [`AudioInterface`].

use anyhow::Result;
use sfc_core::signal::{MultiChannel, Recording};
use sfc_core::traits::AudioInterface;

use crate::error::AudioError;

/// Which excitation is played over which outputs.
///
/// Each pairing of an excitation with an output set is one *system*; the
/// recording holds one slice per system. Output channels are 1-based and an
/// excitation carries one channel per output of its set.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementPlan {
    /// One excitation over one set of outputs.
    Single {
        /// Excitation signal.
        excitation: MultiChannel,
        /// Output channels.
        outputs: Vec<usize>,
    },
    /// The same excitation over several output sets in turn.
    SameSignalPerOutputSet {
        /// Excitation signal.
        excitation: MultiChannel,
        /// Output channel sets.
        output_sets: Vec<Vec<usize>>,
    },
    /// Several excitations in turn over the same outputs.
    SignalsOverSameOutputs {
        /// Excitation signals.
        excitations: Vec<MultiChannel>,
        /// Output channels.
        outputs: Vec<usize>,
    },
    /// Each excitation over its own output set.
    SignalPerOutputSet {
        /// Excitation signals.
        excitations: Vec<MultiChannel>,
        /// Output channel sets, one per excitation.
        output_sets: Vec<Vec<usize>>,
    },
}

impl MeasurementPlan {
    /// A mono excitation played over each output alone, one after another.
    ///
    /// # Example
    /// ```
    /// use sfc_audio::measure::MeasurementPlan;
    /// let plan = MeasurementPlan::each_output(vec![1.0, 0.0], &[1, 2, 3]);
    /// assert_eq!(plan.n_systems(), 3);
    /// ```
    #[must_use]
    pub fn each_output(excitation: Vec<f64>, outputs: &[usize]) -> Self {
        Self::SameSignalPerOutputSet {
            excitation: MultiChannel::mono(excitation),
            output_sets: outputs.iter().map(|&o| vec![o]).collect(),
        }
    }

    /// Number of systems measured.
    #[must_use]
    pub fn n_systems(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::SameSignalPerOutputSet { output_sets, .. } => output_sets.len(),
            Self::SignalsOverSameOutputs { excitations, .. } => excitations.len(),
            Self::SignalPerOutputSet {
                excitations,
                output_sets,
            } => excitations.len().min(output_sets.len()),
        }
    }

    /// The `(excitation, outputs)` pair of every system, validated.
    ///
    /// # Errors
    /// Returns [`AudioError::InvalidPlan`] if the plan has no system, the
    /// excitation and output set counts differ, an excitation does not have
    /// one channel per output, or excitations differ in length.
    pub fn systems(&self) -> Result<Vec<(&MultiChannel, &[usize])>, AudioError> {
        let systems: Vec<(&MultiChannel, &[usize])> = match self {
            Self::Single {
                excitation,
                outputs,
            } => vec![(excitation, outputs)],
            Self::SameSignalPerOutputSet {
                excitation,
                output_sets,
            } => output_sets
                .iter()
                .map(|o| (excitation, o.as_slice()))
                .collect(),
            Self::SignalsOverSameOutputs {
                excitations,
                outputs,
            } => excitations.iter().map(|x| (x, outputs.as_slice())).collect(),
            Self::SignalPerOutputSet {
                excitations,
                output_sets,
            } => {
                if excitations.len() != output_sets.len() {
                    return Err(AudioError::InvalidPlan(format!(
                        "{} excitations pour {} jeux de sorties",
                        excitations.len(),
                        output_sets.len()
                    )));
                }
                excitations
                    .iter()
                    .zip(output_sets)
                    .map(|(x, o)| (x, o.as_slice()))
                    .collect()
            }
        };

        let Some(&(first, _)) = systems.first() else {
            return Err(AudioError::InvalidPlan("aucun système".into()));
        };
        for (sys, &(x, outputs)) in systems.iter().enumerate() {
            if outputs.is_empty() || x.n_channels() != outputs.len() {
                return Err(AudioError::InvalidPlan(format!(
                    "système {sys} : {} canaux d'excitation pour {} sorties",
                    x.n_channels(),
                    outputs.len()
                )));
            }
            if x.n_frames() != first.n_frames() {
                return Err(AudioError::InvalidPlan(format!(
                    "système {sys} : {} échantillons au lieu de {}",
                    x.n_frames(),
                    first.n_frames()
                )));
            }
        }
        Ok(systems)
    }
}

/// Play every system of `plan` `n_reps` times and record at `inputs`.
///
/// The result has shape `(n_samples, inputs.len(), n_systems, n_reps)` with
/// `n_samples` the excitation length.
///
/// # Errors
/// Returns an error for an invalid plan, no inputs, zero repetitions, or a
/// failing or misbehaving interface.
pub fn measure(
    interface: &mut dyn AudioInterface,
    plan: &MeasurementPlan,
    inputs: &[usize],
    n_reps: usize,
) -> Result<Recording> {
    let systems = plan.systems()?;
    if inputs.is_empty() || n_reps == 0 {
        let reason = "au moins une entrée et une répétition".into();
        return Err(AudioError::InvalidPlan(reason).into());
    }
    let n_samples = systems[0].0.n_frames();
    let mut recording = Recording::zeros(n_samples, inputs.len(), systems.len(), n_reps);

    for (sys, (excitation, outputs)) in systems.into_iter().enumerate() {
        for rep in 0..n_reps {
            log::info!("Mesure système {sys} (sorties {outputs:?}), répétition {rep}");
            let recorded = interface.playrec(excitation, outputs, inputs)?;
            if recorded.n_channels() != inputs.len() || recorded.n_frames() != n_samples {
                return Err(AudioError::StreamError(format!(
                    "{} × {} reçus, {} × {} attendus",
                    recorded.n_frames(),
                    recorded.n_channels(),
                    n_samples,
                    inputs.len()
                ))
                .into());
            }
            for (input, samples) in recorded.channels().iter().enumerate() {
                recording.trace_mut(input, sys, rep).copy_from_slice(samples);
            }
        }
    }
    Ok(recording)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Input `i` hears the sum of the played channels times `i + 1`, one
    /// sample late.
    struct Loopback {
        calls: Vec<Vec<usize>>,
    }

    impl AudioInterface for Loopback {
        fn playrec(
            &mut self,
            excitation: &MultiChannel,
            outputs: &[usize],
            inputs: &[usize],
        ) -> Result<MultiChannel> {
            self.calls.push(outputs.to_vec());
            let n = excitation.n_frames();
            let mut mix = vec![0.0; n];
            for ch in excitation.channels() {
                for (k, &s) in ch.iter().enumerate().take(n.saturating_sub(1)) {
                    mix[k + 1] += s;
                }
            }
            let channels = (0..inputs.len())
                .map(|i| mix.iter().map(|s| s * (i + 1) as f64).collect())
                .collect();
            Ok(MultiChannel::new(channels)?)
        }

        fn sample_rate(&self) -> u32 {
            8000
        }
    }

    fn loopback() -> Loopback {
        Loopback { calls: Vec::new() }
    }

    #[test]
    fn each_output_is_measured_per_repetition() {
        let mut interface = loopback();
        let plan = MeasurementPlan::each_output(vec![1.0, 0.5, 0.0], &[1, 2]);
        let rec = measure(&mut interface, &plan, &[1, 2], 2).unwrap();
        assert_eq!(rec.n_samples(), 3);
        assert_eq!(rec.n_inputs(), 2);
        assert_eq!(rec.n_systems(), 2);
        assert_eq!(rec.n_reps(), 2);
        assert_eq!(rec.trace(1, 1, 1), &[0.0, 2.0, 1.0]);
        assert_eq!(interface.calls, vec![vec![1], vec![1], vec![2], vec![2]]);
    }

    #[test]
    fn signals_over_same_outputs() {
        let mut interface = loopback();
        let plan = MeasurementPlan::SignalsOverSameOutputs {
            excitations: vec![
                MultiChannel::new(vec![vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap(),
                MultiChannel::new(vec![vec![0.0, 0.0], vec![3.0, 0.0]]).unwrap(),
            ],
            outputs: vec![3, 4],
        };
        let rec = measure(&mut interface, &plan, &[1], 1).unwrap();
        assert_eq!(rec.trace(0, 0, 0), &[0.0, 2.0]);
        assert_eq!(rec.trace(0, 1, 0), &[0.0, 3.0]);
    }

    #[test]
    fn single_plan_plays_all_outputs_at_once() {
        let mut interface = loopback();
        let plan = MeasurementPlan::Single {
            excitation: MultiChannel::new(vec![vec![1.0, 0.0, 0.0], vec![0.0, 2.0, 0.0]]).unwrap(),
            outputs: vec![5, 6],
        };
        let rec = measure(&mut interface, &plan, &[1, 2], 2).unwrap();
        assert_eq!(rec.n_systems(), 1);
        assert_eq!(rec.n_reps(), 2);
        for rep in 0..2 {
            assert_eq!(rec.trace(0, 0, rep), &[0.0, 1.0, 2.0]);
            assert_eq!(rec.trace(1, 0, rep), &[0.0, 2.0, 4.0]);
        }
        assert_eq!(interface.calls, vec![vec![5, 6], vec![5, 6]]);
    }

    #[test]
    fn signal_per_output_set_pairs_each_excitation() {
        let mut interface = loopback();
        let plan = MeasurementPlan::SignalPerOutputSet {
            excitations: vec![
                MultiChannel::mono(vec![1.0, 0.0, 0.0]),
                MultiChannel::new(vec![vec![0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap(),
            ],
            output_sets: vec![vec![1], vec![2, 3]],
        };
        let rec = measure(&mut interface, &plan, &[4], 1).unwrap();
        assert_eq!(rec.n_systems(), 2);
        assert_eq!(rec.trace(0, 0, 0), &[0.0, 1.0, 0.0]);
        assert_eq!(rec.trace(0, 1, 0), &[0.0, 0.0, 2.0]);
        assert_eq!(interface.calls, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let plan = MeasurementPlan::Single {
            excitation: MultiChannel::mono(vec![1.0]),
            outputs: vec![1, 2],
        };
        assert!(matches!(plan.systems(), Err(AudioError::InvalidPlan(_))));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let plan = MeasurementPlan::SignalPerOutputSet {
            excitations: vec![
                MultiChannel::mono(vec![1.0, 0.0]),
                MultiChannel::mono(vec![1.0]),
            ],
            output_sets: vec![vec![1], vec![2]],
        };
        assert!(plan.systems().is_err());

        let plan = MeasurementPlan::SignalPerOutputSet {
            excitations: vec![MultiChannel::mono(vec![1.0])],
            output_sets: vec![vec![1], vec![2]],
        };
        assert!(plan.systems().is_err());
    }

    #[test]
    fn no_repetition_is_an_error() {
        let plan = MeasurementPlan::each_output(vec![1.0], &[1]);
        assert!(measure(&mut loopback(), &plan, &[1], 0).is_err());
        assert!(measure(&mut loopback(), &plan, &[], 1).is_err());
    }
}
