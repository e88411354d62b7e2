use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_convert_nexus() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/gene1.fas")
        .arg("-f")
        .arg("nexus")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let nexus = fs::read_to_string(temp.path().join("gene1.nex"))?;
    assert!(nexus.starts_with("#NEXUS\n"));
    assert!(nexus.contains("dimensions ntax=4 nchar=12 ;"));
    assert!(nexus.contains(&format!("{:<40} ATG--GCCAGGA\n", "spd")));
    assert!(!nexus.contains("charset"), "single partition");

    Ok(())
}

#[test]
fn command_convert_many_formats() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/gene2.fas")
        .arg("tests/aln/gene3.phy")
        .arg("-f")
        .arg("phylip")
        .arg("-f")
        .arg("stockholm")
        .arg("--suffix")
        .arg("_out")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let phylip = fs::read_to_string(temp.path().join("gene3_out.phy"))?;
    assert_eq!(phylip, format!("2 6\n{:<30} ACGTAC\n{:<30} ACGTTC\n", "spa", "spc"));

    let stockholm = fs::read_to_string(temp.path().join("gene2_out.stockholm"))?;
    assert!(stockholm.contains("spe\tATGCNNNNN\n"));
    assert!(stockholm.ends_with("//\n"));

    Ok(())
}

#[test]
fn command_convert_skips_bad_files() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/bad.txt")
        .arg("tests/aln/ragged.fas")
        .arg("tests/aln/gene1.fas")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    assert!(temp.path().join("gene1.fas").exists());
    assert!(!temp.path().join("ragged.fas").exists());

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/bad.txt")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid alignment"));

    Ok(())
}

#[test]
fn command_convert_ima2() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/gene1.fas")
        .arg("-f")
        .arg("ima2")
        .arg("--ima2-pop")
        .arg("tests/aln/pops.txt")
        .arg("--ima2-tree")
        .arg("(0,1):2")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let ima2 = fs::read_to_string(temp.path().join("gene1.txt"))?;
    let lines: Vec<&str> = ima2.lines().collect();
    assert_eq!(lines[1], "2");
    assert_eq!(lines[2], "pop1 pop2");
    assert_eq!(lines[5], "gene1 2 2 12 IS 1");

    // population file is required
    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("convert")
        .arg("tests/aln/gene1.fas")
        .arg("-f")
        .arg("ima2")
        .arg("-o")
        .arg(temp.path().join("none"))
        .assert()
        .failure();

    Ok(())
}
