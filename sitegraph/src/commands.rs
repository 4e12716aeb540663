use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

const FORMATS: [&str; 5] = ["text", "txt", "json", "markdown", "md"];

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the sitegraph run history database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the sitegraph database")
                        .default_value("~/.config/sitegraph/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("analyze")
                .about(
                    "Run an analysis pass over a crawl snapshot: link graph, depth, orphans, \
                link equity and keyword cannibalization.",
                )
                .arg(
                    arg!(-s --"snapshot" <PATH>)
                        .required(true)
                        .help("Path to a JSON crawl snapshot")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-r --"rules" <PATH>)
                        .required(false)
                        .help("Path to a JSON redirect rule file (default: rules embedded in the snapshot)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to a JSON analysis config")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"root" <PATH>)
                        .required(false)
                        .help("Root page for depth and equity seeding; repeat for several roots")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(FORMATS)
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Directory holding the sitegraph database")
                        .default_value("~/.config/sitegraph/"),
                )
                .arg(
                    arg!(--"no-save")
                        .required(false)
                        .help("Do not record this run in the history database")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("resolve")
                .about("Follow a URL through the redirect rules and print every hop")
                .arg(arg!(<URL>).required(true).help("The URL or path to resolve"))
                .arg(
                    arg!(-r --"rules" <PATH>)
                        .required(true)
                        .help("Path to a JSON redirect rule file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"max-hops" <HOPS>)
                        .required(false)
                        .help("Maximum number of redirects to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                ),
        )
        .subcommand(
            command!("audit")
                .about("Check a redirect rule set for chains, loops and shadowed rules")
                .arg(
                    arg!(-r --"rules" <PATH>)
                        .required(true)
                        .help("Path to a JSON redirect rule file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"max-hops" <HOPS>)
                        .required(false)
                        .help("Maximum number of redirects to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                ),
        )
        .subcommand(
            command!("history")
                .about("List recorded analysis runs, newest first")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Directory holding the sitegraph database")
                        .default_value("~/.config/sitegraph/"),
                ),
        )
        .subcommand(
            command!("report")
                .about("Render the report of a recorded run")
                .arg(
                    arg!(<RUN_ID>)
                        .required(true)
                        .help("Run id as shown by `sitegraph history`, or `latest`"),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Directory holding the sitegraph database")
                        .default_value("~/.config/sitegraph/"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(FORMATS)
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_analyze_arguments() {
        let matches = command_argument_builder().get_matches_from([
            "sitegraph",
            "-vv",
            "analyze",
            "--snapshot",
            "crawl.json",
            "--root",
            "/",
            "--root",
            "/shop",
            "--format",
            "md",
            "--no-save",
        ]);

        assert_eq!(matches.get_count("verbose"), 2);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "analyze");
        let roots: Vec<&String> = sub.get_many::<String>("root").unwrap().collect();
        assert_eq!(roots, vec!["/", "/shop"]);
        assert_eq!(sub.get_one::<String>("format").unwrap(), "md");
        assert!(sub.get_flag("no-save"));
        assert_eq!(sub.get_one::<String>("db").unwrap(), "~/.config/sitegraph/");
    }

    #[test]
    fn test_resolve_requires_rules() {
        let result =
            command_argument_builder().try_get_matches_from(["sitegraph", "resolve", "/old"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = command_argument_builder().try_get_matches_from([
            "sitegraph",
            "analyze",
            "-s",
            "crawl.json",
            "-f",
            "csv",
        ]);

        assert!(result.is_err());
    }
}
