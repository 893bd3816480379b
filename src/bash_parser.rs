use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser, TreeCursor};

pub struct BashParser {
    parser: Parser,
}

impl BashParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let lang = tree_sitter_bash::language();
        parser
            .set_language(&lang)
            .map_err(|e| anyhow!("failed to load bash grammar: {}", e))?;
        Ok(Self { parser })
    }

    pub fn parse_to_tree(&mut self, source: &str) -> Option<tree_sitter::Tree> {
        self.parser.parse(source, None)
    }

    /// Every program a shell line would invoke, in source order.
    ///
    /// Covers pipelines, lists (`&&`, `||`, `;`), subshells and command
    /// substitutions. Assignments and redirections are not programs and are
    /// skipped.
    pub fn command_names(&mut self, source: &str) -> Vec<String> {
        let Some(tree) = self.parse_to_tree(source) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        collect_command_names(tree.root_node(), source.as_bytes(), &mut names);
        names
    }
}

fn collect_command_names(node: Node, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "command" {
        if let Some(name) = node.child_by_field_name("name") {
            if let Ok(text) = name.utf8_text(source) {
                let text = text.trim_matches(|c| c == '"' || c == '\'');
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
        }
    }
    let mut cursor: TreeCursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_command_names(child, source, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_pipeline() -> Result<()> {
        let mut p = BashParser::new()?;
        assert_eq!(p.command_names("echo 1 | grep 1"), vec!["echo", "grep"]);
        Ok(())
    }

    #[test]
    fn lists_and_substitutions() -> Result<()> {
        let mut p = BashParser::new()?;
        assert_eq!(
            p.command_names("mkdir out && cd out; echo $(whoami)"),
            vec!["mkdir", "cd", "echo", "whoami"]
        );
        Ok(())
    }

    #[test]
    fn port_kill_one_liner() -> Result<()> {
        let mut p = BashParser::new()?;
        assert_eq!(
            p.command_names("lsof -ti :3000 | xargs kill -9"),
            vec!["lsof", "xargs"]
        );
        Ok(())
    }

    #[test]
    fn empty_source_has_no_commands() -> Result<()> {
        let mut p = BashParser::new()?;
        assert!(p.command_names("").is_empty());
        Ok(())
    }
}
