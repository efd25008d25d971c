use clap::{ArgAction, Args, ValueEnum};
use momiji_wz::{crypto::WzRegion, WzConfig};

/// Configures the verbosity of the builtin logger.
#[derive(Clone, Copy, Debug, Args)]
pub struct Verbosity {
    /// Configures the log verbosity of Momiji.
    ///
    /// `-v` is Info, `-vv` is Debug, `-vvv` is Trace.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Verbosity {
    /// Configures the global logger based on the settings.
    pub fn setup(self) {
        let level = self.log_level();
        simple_logger::init_with_level(level).unwrap();
    }

    fn log_level(self) -> log::Level {
        match self.verbose {
            0 => log::Level::Warn,
            1 => log::Level::Info,
            2 => log::Level::Debug,
            _ => log::Level::Trace,
        }
    }
}

/// Key material and version selection for opening archives.
#[derive(Clone, Copy, Debug, Args)]
pub struct WzArgs {
    /// The numeric game version the archive was built for.
    #[clap(short = 'g', long, env = "MOMIJI_GAME_VERSION")]
    pub game_version: u16,

    /// The region whose key material decrypts the archive.
    #[clap(short, long, value_enum, default_value_t = Region::Gms)]
    pub region: Region,
}

/// The region key table to decrypt an archive with.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Region {
    /// Global MapleStory distributions.
    Gms,
    /// SEA distributions.
    Sea,
    /// Old and private distributions without string encryption.
    Classic,
}

impl WzArgs {
    /// The archive configuration selected by these arguments.
    pub fn config(&self) -> WzConfig {
        let region = match self.region {
            Region::Gms => WzRegion::Gms,
            Region::Sea => WzRegion::Sea,
            Region::Classic => WzRegion::Classic,
        };

        WzConfig::new(region, self.game_version)
    }
}
