use green_apple::ViewerConfig;

fn main() -> anyhow::Result<()> {
    green_apple::run(ViewerConfig::default())
}
