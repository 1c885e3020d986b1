fn main() -> anyhow::Result<()> {
    votelink_lib::run()
}
