fn main() {
    taskly_countdown::run()
}
