use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_APPLYTO: Regex = Regex::new(r"applyto=\(([^)]*)\)").unwrap();
    static ref RE_NST: Regex = Regex::new(r"nst=[0-9]").unwrap();
    static ref RE_STATEFREQ: Regex = Regex::new(r"statefreqpr=[^\s;]*\)").unwrap();
}

/// MrBayes model names and the `lset`/`prset` parameters that define them
pub const MRBAYES_MODELS: [(&str, [&str; 2]); 6] = [
    ("GTR", ["nst=6", "statefreqpr=dirichlet(1,1,1,1)"]),
    ("SYM", ["nst=6", "statefreqpr=fixed(equal)"]),
    ("HKY", ["nst=2", "statefreqpr=dirichlet(1,1,1,1)"]),
    ("K2P", ["nst=2", "statefreqpr=fixed(equal)"]),
    ("F81", ["nst=1", "statefreqpr=dirichlet(1,1,1,1)"]),
    ("JC", ["nst=1", "statefreqpr=fixed(equal)"]),
];

/// Parameters of a named MrBayes model
pub fn mrbayes_params(name: &str) -> Option<Vec<String>> {
    MRBAYES_MODELS
        .iter()
        .find(|(model, _)| model.eq_ignore_ascii_case(name))
        .map(|(_, params)| params.iter().map(|p| p.to_string()).collect())
}

/// Model name for a complete parameter set
pub fn mrbayes_name(params: &[String]) -> Option<String> {
    MRBAYES_MODELS
        .iter()
        .find(|(_, p)| p.len() == params.len() && p.iter().zip(params).all(|(a, b)| a == b))
        .map(|(model, _)| model.to_string())
}

/// Substitution models of one partition. Codon partitions carry one entry
/// per codon position, others a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub params: Vec<Vec<String>>,
    pub names: Vec<Option<String>>,
    /// Linked codon positions, e.g. `["12", "3"]`
    pub links: Vec<String>,
}

impl Default for Model {
    fn default() -> Self {
        Self::with_subparts(1)
    }
}

impl Model {
    pub fn with_subparts(n: usize) -> Self {
        Self {
            params: vec![vec![]; n],
            names: vec![None; n],
            links: vec![],
        }
    }

    /// A single model applied to the whole partition
    pub fn single(name: &str) -> Self {
        Self {
            params: vec![mrbayes_params(name).unwrap_or_default()],
            names: vec![Some(name.to_string())],
            links: vec![],
        }
    }

    pub fn is_set(&self) -> bool {
        self.names.iter().any(|n| n.is_some())
    }

    /// Grows the per-subpartition lists
    pub(crate) fn resize(&mut self, n: usize) {
        self.params.resize(n, vec![]);
        self.names.resize(n, None);
    }

    pub(crate) fn push_params(&mut self, subpart: usize, params: &[String]) {
        if subpart >= self.params.len() {
            self.resize(subpart + 1);
        }
        self.params[subpart].extend(params.iter().cloned());
        self.names[subpart] = mrbayes_name(&self.params[subpart]);
    }
}

/// Targets and parameters of one `lset`/`prset` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCommand {
    /// 1-based subpartition indices, `None` for `applyto=(all)`
    pub applyto: Option<Vec<usize>>,
    pub params: Vec<String>,
}

/// Parses a `lset` or `prset` command.
///
/// ```
/// use alnkit::libs::partition::model::parse_model_command;
/// let cmd = parse_model_command("lset applyto=(1,2) nst=6;").unwrap();
/// assert_eq!(cmd.applyto, Some(vec![1, 2]));
/// assert_eq!(cmd.params, vec!["nst=6"]);
///
/// let cmd = parse_model_command("prset applyto=(all) statefreqpr=fixed(equal);").unwrap();
/// assert_eq!(cmd.applyto, None);
/// assert_eq!(cmd.params, vec!["statefreqpr=fixed(equal)"]);
///
/// assert!(parse_model_command("lset nst=6;").is_none());
/// ```
pub fn parse_model_command(line: &str) -> Option<ModelCommand> {
    let line = line.to_lowercase();
    let applyto = RE_APPLYTO.captures(&line)?;

    let mut params = vec![];
    if let Some(m) = RE_NST.find(&line) {
        params.push(m.as_str().to_string());
    }
    if let Some(m) = RE_STATEFREQ.find(&line) {
        params.push(m.as_str().to_string());
    }

    let targets = applyto.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    let applyto = if targets == "all" {
        None
    } else {
        let idx = targets
            .split(',')
            .filter_map(|x| x.trim().parse::<usize>().ok())
            .collect();
        Some(idx)
    };

    Some(ModelCommand { applyto, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_table() {
        assert_eq!(
            mrbayes_params("hky").unwrap(),
            vec!["nst=2", "statefreqpr=dirichlet(1,1,1,1)"]
        );
        assert!(mrbayes_params("LG").is_none());

        let params = vec!["nst=1".to_string(), "statefreqpr=fixed(equal)".to_string()];
        assert_eq!(mrbayes_name(&params).unwrap(), "JC");
        assert!(mrbayes_name(&params[..1]).is_none());
    }

    #[test]
    fn accumulate_params() {
        let mut model = Model::default();
        model.push_params(0, &["nst=6".to_string()]);
        assert_eq!(model.names[0], None);
        model.push_params(0, &["statefreqpr=fixed(equal)".to_string()]);
        assert_eq!(model.names[0].as_deref(), Some("SYM"));

        model.push_params(2, &["nst=1".to_string()]);
        assert_eq!(model.params.len(), 3);
    }
}
