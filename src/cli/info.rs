use std::io::{self, Write};

/// Print version, OS, architecture and CPU count as a small table.
pub fn print_system_info<W: Write>(out: &mut W) -> io::Result<()> {
    let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
    let rows = [
        ["VERSION", "OS", "ARCH", "NUM CPUS"].map(String::from),
        [
            env!("CARGO_PKG_VERSION").to_string(),
            std::env::consts::OS.to_string(),
            std::env::consts::ARCH.to_string(),
            cpus.to_string(),
        ],
    ];

    let widths: Vec<usize> = (0..4)
        .map(|col| rows.iter().map(|row| row[col].len()).max().unwrap_or(0))
        .collect();

    for row in &rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        let mut out = Vec::new();
        print_system_info(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("VERSION"));
        assert!(lines[0].ends_with("NUM CPUS"));
        assert!(lines[1].starts_with(env!("CARGO_PKG_VERSION")));
        assert!(lines[1].contains(std::env::consts::OS));
    }
}
