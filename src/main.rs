fn main() -> anyhow::Result<()> {
    haacchi::runtime::run()
}
