use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(gatehouse_step_up_migration::Migrator).await;
}
