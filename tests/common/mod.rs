use assert_cmd::Command;

pub fn botd_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("botd").expect("botd test binary should build")
    }
}
