use aligned_text_config::{Config, RuleConfig};
use aligned_text_engine::{Edit, Interval, Layer};
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::{env, process};

/// A base layer and one derived layer per applied rule, bottom first.
struct Stack {
    layers: Vec<Layer>,
}

impl Stack {
    fn build(text: &str, rules: &[RuleConfig]) -> Result<Self> {
        let mut layers = vec![Layer::new(text)];
        for rule in rules {
            let regex = Regex::new(&rule.pattern)
                .with_context(|| format!("Invalid pattern in rule '{}'", rule.label()))?;
            let top = layers.last().context("layer stack is empty")?;
            let edits = Edit::from_regex(&top.text(), &regex, &rule.replacement);
            log::debug!("rule '{}': {} edit(s)", rule.label(), edits.len());
            let derived = top
                .rewrite(edits)
                .with_context(|| format!("Failed to apply rule '{}'", rule.label()))?;
            layers.push(derived);
        }
        Ok(Self { layers })
    }

    fn base(&self) -> &Layer {
        &self.layers[0]
    }

    fn top(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Final text followed by one line per token: its interval in the final
    /// text, the interval it resolves to in the input, and both texts.
    fn report(&self) -> Result<String> {
        let top = self.top();
        let base = self.base();
        let text = top.text();
        let token = Regex::new(r"\S+")?;

        let mut out = String::new();
        writeln!(out, "{text}")?;
        writeln!(out, "---")?;
        for found in token.find_iter(&text) {
            let interval = Interval::from(found.range());
            let original = top.resolve_to_base(interval)?;
            writeln!(
                out,
                "{interval} -> {original} {:?} <- {:?}",
                found.as_str(),
                base.text_range(original)?
            )?;
        }
        Ok(out)
    }
}

fn load_config(config_arg: Option<&str>) -> Result<(Config, PathBuf)> {
    let config_path = match config_arg {
        Some(arg) => Config::expand_path(Path::new(arg)),
        None => Config::config_path(),
    };
    log::info!("Config path: {}", config_path.display());
    let config = Config::load_from_path(&config_path)?.unwrap_or_else(|| {
        log::info!("No config file found, applying no rules");
        Config::default()
    });
    Ok((config, config_path))
}

fn run(input_path: &Path, config_arg: Option<&str>) -> Result<String> {
    let (config, config_path) = load_config(config_arg)?;
    let text = std::fs::read_to_string(input_path)
        .with_context(|| format!("Failed to read input file '{}'", input_path.display()))?;
    let stack = Stack::build(&text, &config.rules)
        .with_context(|| format!("Failed to apply rules from '{}'", config_path.display()))?;
    log::info!(
        "applied {} rule(s) to {} byte(s)",
        config.rules.len(),
        text.len()
    );
    stack.report()
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        eprintln!("Usage: {} <input-file> [config-file]", args[0]);
        eprintln!(
            "Rules are read from {} when no config file is given",
            Config::config_path().display()
        );
        process::exit(1);
    }

    match run(Path::new(&args[1]), args.get(2).map(String::as_str)) {
        Ok(report) => print!("{report}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            eprintln!("Usage: {} <input-file> [config-file]", args[0]);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn rule(pattern: &str, replacement: &str) -> RuleConfig {
        RuleConfig {
            name: None,
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    #[test]
    fn no_rules_reports_identity_alignment() {
        let stack = Stack::build("a bc", &[]).unwrap();
        insta::assert_snapshot!(stack.report().unwrap().trim_end(), @r#"
        a bc
        ---
        [0, 1) -> [0, 1) "a" <- "a"
        [2, 4) -> [2, 4) "bc" <- "bc"
        "#);
    }

    #[test]
    fn each_rule_adds_a_layer() {
        let rules = [rule("&amp;", "&"), rule(r"\s+", " ")];
        let stack = Stack::build("x &amp;   y", &rules).unwrap();
        assert_eq!(stack.layers.len(), 3);
        assert_eq!(&*stack.top().text(), "x & y");
        assert_eq!(&*stack.layers[1].text(), "x &   y");
    }

    #[test]
    fn tokens_resolve_to_their_original_text() {
        let rules = [rule(r"(\w+)-\s+(\w+)", "$1$2")];
        let stack = Stack::build("hyphen- ated  words", &rules).unwrap();
        insta::assert_snapshot!(stack.report().unwrap().trim_end(), @r#"
        hyphenated  words
        ---
        [0, 10) -> [0, 12) "hyphenated" <- "hyphen- ated"
        [12, 17) -> [14, 19) "words" <- "words"
        "#);
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let rules = [RuleConfig {
            name: Some("broken".into()),
            pattern: "(".into(),
            replacement: String::new(),
        }];
        let err = Stack::build("text", &rules).err().unwrap();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn run_reads_rules_from_the_given_config() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.txt");
        let config = temp_dir.path().join("rules.toml");
        std::fs::write(&input, "a, b").unwrap();
        std::fs::write(&config, "[[rules]]\npattern = \",\"\n").unwrap();

        let report = run(&input, config.to_str()).unwrap();
        assert!(report.starts_with("a b\n---\n"));
        assert!(report.contains("[2, 3) -> [3, 4) \"b\" <- \"b\""));
    }

    #[test]
    fn missing_config_file_applies_no_rules() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.txt");
        std::fs::write(&input, "a, b").unwrap();
        let missing = temp_dir.path().join("missing.toml");

        let report = run(&input, missing.to_str()).unwrap();
        assert!(report.starts_with("a, b\n"));
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        let config = temp_dir.path().join("none.toml");

        let err = run(&missing, config.to_str()).unwrap_err();
        assert!(format!("{err:#}").contains("missing.txt"));
    }
}
