use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn usemin_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("usemin"));
	cmd.env("NO_COLOR", "1");
	cmd
}

pub const SITE_HTML: &str = r#"<html>
<head>
  <!-- build:css styles/main.css -->
  <link rel="stylesheet" href="styles/a.css">
  <link rel="stylesheet" href="styles/b.css">
  <!-- endbuild -->
</head>
<body>
  <!-- build:js scripts/site.js -->
  <script src="scripts/foo.js"></script>
  <script src="scripts/bar.js"></script>
  <!-- endbuild -->
</body>
</html>
"#;
