use clap::Parser;

/// This program draws the map of the runoff winner in each municipality.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the report: the input files, the election rules and
    /// the decoration of the map. Relative paths inside it are resolved against its directory.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path or 'stdout') Where to write the map in SVG format. Setting this option
    /// overrides the path that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the winner in each municipality will be written
    /// in JSON format to the given location. Setting this option overrides the path that may be
    /// specified in the configuration.
    #[clap(short, long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference file containing the expected summary in JSON format. If provided,
    /// runoffmap will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
