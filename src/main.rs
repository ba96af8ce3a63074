fn main() {
    prospector::run();
}
