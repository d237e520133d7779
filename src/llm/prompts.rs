pub const SYSTEM: &str = "You are a helpful assistant.";

pub const DEFAULT: &str = r#"You are an expert software engineer.
Review the provided diffs which are about to be committed to a git repo.
Review the diffs carefully.
Generate a commit message for those changes.
The commit message MUST use the imperative tense.
Reply with JUST the commit message, without quotes, comments, questions, etc!"#;

pub const REFACTORING: &str = r#"Please provide a detailed git commit message that explains the refactoring changes described below.
Please detail every major change as a separate bullet point.
Reply with JUST the commit message, without quotes, comments, questions, etc!"#;

pub const DOCUMENTATION: &str = r#"Please provide a git commit message that explains the documentation changes described below.
Reply with JUST the commit message, without quotes, comments, questions, etc!"#;

pub const MIMIC_HEAD: &str = r#"Please provide a git commit message for the diffs provided below.
Your message should closely mimic the style and structure of the following recent git commit messages in this repository:"#;

pub const MIMIC_TAIL: &str =
    "Reply with JUST the commit message, without quotes, comments, questions, etc!";

pub const DIFF_HEADER: &str = r#"Output of "git diff --staged":"#;
