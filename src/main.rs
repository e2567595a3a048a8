// `tsnconf` binary. Exit status: 0 success, 1 I/O or other failure,
// 2 unreadable input, 3 input naming something the schema lacks.

fn main() {
    #[cfg(feature = "cli")]
    tsnconf::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("tsnconf: the command-line tool needs the `cli` feature.");
        std::process::exit(1);
    }
}
