use core::panic::PanicInfo;
use defmt::error;

// A panicked firmware simply halts: the relay output idles low, so a wedged
// board can never hold the host in reset, and the supervisor surfaces the
// dead serial link on its next exchange.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("watchdog firmware panic: {}", defmt::Display2Format(info));
    cortex_m::asm::udf();
}
