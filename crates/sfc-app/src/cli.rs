use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sfc — Acoustic measurements and sound field control filters.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Générer un sweep exponentiel (WAV), éventuellement multicanal.
    Sweep {
        /// Fichier WAV de sortie.
        #[arg(long)]
        out: PathBuf,
        /// Nombre de canaux joués l'un après l'autre.
        #[arg(long, default_value_t = 1)]
        channels: usize,
        /// Répétitions par canal. Défaut : config.
        #[arg(long)]
        reps: Option<usize>,
        /// Ajouter un canal de référence (somme des canaux).
        #[arg(long, default_value_t = false)]
        reference: bool,
    },

    /// Calibrer un micro sur un calibrateur acoustique.
    Calibrate {
        /// Enregistrement existant du calibrateur.
        #[arg(long, conflicts_with = "record")]
        file: Option<PathBuf>,
        /// Enregistrer le calibrateur via l'interface audio.
        #[arg(long, default_value_t = false)]
        record: bool,
        /// Dossier où écrire l'enregistrement.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Canal d'entrée (1 = premier). Défaut : config.
        #[arg(long)]
        channel: Option<usize>,
        /// Niveau du calibrateur en dB SPL. Défaut : config.
        #[arg(long)]
        level: Option<f64>,
    },

    /// Mesurer les réponses impulsionnelles de chaque sortie par sweep.
    Measure {
        /// Dossier de sortie (recording.wav, irs.wav).
        #[arg(long)]
        out_dir: PathBuf,
        /// Sorties, ex. 1,2,3. Défaut : config.
        #[arg(long, value_delimiter = ',')]
        outputs: Vec<usize>,
        /// Entrées, ex. 1,2. Défaut : config.
        #[arg(long, value_delimiter = ',')]
        inputs: Vec<usize>,
    },

    /// Déconvoluer un enregistrement B&K en réponses impulsionnelles.
    Bk {
        /// Enregistrement WAV du frontal B&K.
        #[arg(long)]
        file: PathBuf,
        /// Nombre de systèmes enregistrés en série.
        #[arg(long, default_value_t = 1)]
        systems: usize,
        /// Répétitions par système.
        #[arg(long, default_value_t = 1)]
        reps: usize,
        /// Fichier WAV des réponses (canal = micro × systèmes + système).
        #[arg(long)]
        out: PathBuf,
        /// Le premier canal est un micro, pas la référence.
        #[arg(long, default_value_t = false)]
        no_reference: bool,
    },

    /// Concevoir des filtres de contrôle par pressure matching.
    Design {
        /// Réponses du plant (canal = micro × sources + source).
        #[arg(long)]
        plant: PathBuf,
        /// Nombre de sources (haut-parleurs).
        #[arg(long)]
        sources: usize,
        /// Réponses cibles, un canal par micro.
        #[arg(long)]
        target: PathBuf,
        /// Fichier WAV des filtres, un canal par source.
        #[arg(long)]
        out: PathBuf,
        /// Régularisation. Défaut : config.
        #[arg(long)]
        reg: Option<f64>,
        /// Longueur des filtres. Défaut : config.
        #[arg(long)]
        taps: Option<usize>,
        /// Rapport de validation JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Filtrer un signal mono par un banc de filtres (overlap-add).
    Filter {
        /// Banc de filtres, un canal par sortie.
        #[arg(long)]
        filters: PathBuf,
        /// Signal d'entrée (premier canal).
        #[arg(long)]
        input: PathBuf,
        /// Fichier WAV de sortie.
        #[arg(long)]
        out: PathBuf,
    },

    /// Positions des micros de l'antenne plane B&K (JSON).
    Array {
        /// Fichier JSON de sortie. Défaut : stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Validate argument combinations clap cannot express.
    ///
    /// # Errors
    /// Returns an error if `calibrate` has neither `--file` nor `--record`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Command::Calibrate {
            file: None,
            record: false,
            ..
        } = self.command
        {
            anyhow::bail!("Aucune source de calibration. Utilisez --file ou --record.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sfc",
            "measure",
            "--out-dir",
            "out",
            "--outputs",
            "1,2,3",
            "--log-level",
            "info",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        match cli.command {
            Command::Measure {
                outputs, inputs, ..
            } => {
                assert_eq!(outputs, vec![1, 2, 3]);
                assert!(inputs.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn calibrate_needs_a_source() {
        let cli = Cli::try_parse_from(["sfc", "calibrate"]).unwrap();
        assert!(cli.validate().is_err());
        let cli = Cli::try_parse_from(["sfc", "calibrate", "--record"]).unwrap();
        assert!(cli.validate().is_ok());
        assert!(Cli::try_parse_from(["sfc", "calibrate", "--record", "--file", "a.wav"]).is_err());
    }

    #[test]
    fn array_writes_to_stdout_by_default() {
        let cli = Cli::try_parse_from(["sfc", "array"]).unwrap();
        assert!(matches!(cli.command, Command::Array { out: None }));
    }
}
