use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_concat_nexus() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    let output = cmd
        .arg("concat")
        .arg("tests/aln/gene1.fas")
        .arg("tests/aln/gene2.fas")
        .arg("-f")
        .arg("nexus")
        .arg("-o")
        .arg(temp.path())
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout, "concatenated\t2\t5\t21\n");

    let nexus = fs::read_to_string(temp.path().join("concatenated.nex"))?;
    assert!(nexus.contains("dimensions ntax=5 nchar=21 ;"));
    assert!(nexus.contains(&format!("{:<40} {}ATGCNNNNN\n", "spe", "N".repeat(12))));
    assert!(nexus.contains(&format!("{:<40} ATG--GCCAGGA{}\n", "spd", "N".repeat(9))));
    assert!(nexus.contains("\tcharset gene1 = 1-12;\n\tcharset gene2 = 13-21;\n"));
    assert!(nexus.contains("\tpartition part = 2: gene1, gene2;\n"));

    Ok(())
}

#[test]
fn command_concat_phylip() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let taxa = temp.path().join("taxa.txt");

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("concat")
        .arg("tests/aln/gene1.fas")
        .arg("tests/aln/gene2.fas")
        .arg("tests/aln/gene3.phy")
        .arg("-f")
        .arg("phylip")
        .arg("--name")
        .arg("matrix")
        .arg("--taxa-file")
        .arg(&taxa)
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let phylip = fs::read_to_string(temp.path().join("matrix.phy"))?;
    assert!(phylip.starts_with("5 27\n"));

    let part = fs::read_to_string(temp.path().join("matrix.partFile"))?;
    assert_eq!(
        part,
        "GTR, gene1 = 1-12\nGTR, gene2 = 13-21\nGTR, gene3 = 22-27\n"
    );

    let taxa = fs::read_to_string(&taxa)?;
    assert_eq!(taxa, "spa\nspb\nspc\nspd\nspe\n");

    Ok(())
}

#[test]
fn command_reverse() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("reverse")
        .arg("tests/aln/concat.fas")
        .arg("--partitions")
        .arg("tests/aln/parts.txt")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let gene1 = fs::read_to_string(temp.path().join("gene1.fas"))?;
    assert_eq!(gene1, fs::read_to_string("tests/aln/gene1.fas")?);

    let gene2 = fs::read_to_string(temp.path().join("gene2.fas"))?;
    assert_eq!(gene2, fs::read_to_string("tests/aln/gene2.fas")?);

    Ok(())
}

#[test]
fn command_reverse_bad_partitions() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let parts = temp.path().join("short.txt");
    fs::write(&parts, "DNA, gene1 = 1-12\n")?;

    let mut cmd = Command::cargo_bin("alnkit")?;
    cmd.arg("reverse")
        .arg("tests/aln/concat.fas")
        .arg("--partitions")
        .arg(&parts)
        .arg("-o")
        .arg(temp.path())
        .assert()
        .failure();

    Ok(())
}
